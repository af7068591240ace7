//! Request types and configuration for fleet operations.

use hearth_core::{DeviceType, Host};
use hearth_device::DEFAULT_BROADCAST;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to sweep the network for devices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRequest {
    /// Broadcast addresses to sweep in addition to the default one.
    #[serde(default)]
    pub additional_broadcasts: Vec<String>,
    /// Hosts to connect to directly.
    #[serde(default)]
    pub manual_devices: Vec<String>,
}

/// Request to run one command against a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRequest {
    /// Target device.
    pub host: Host,
    /// Feature to change (`state`, `brightness`, ...).
    pub feature: String,
    /// Action name (`turn_on`, `set_brightness`, ...).
    pub action: String,
    /// Feature-specific value.
    #[serde(default)]
    pub value: Value,
    /// Child index for multi-outlet devices.
    #[serde(default)]
    pub child_num: Option<usize>,
}

/// Configuration for the fleet service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Drop devices that expose a native HomeKit or Matter module.
    #[serde(default)]
    pub hide_homekit_matter: bool,
    /// Broadcast address every sweep searches.
    #[serde(default = "FleetConfig::default_broadcast")]
    pub default_broadcast: String,
    /// Device types never reported by discovery.
    #[serde(default = "FleetConfig::default_excluded_types")]
    pub excluded_types: Vec<DeviceType>,
}

impl FleetConfig {
    fn default_broadcast() -> String {
        DEFAULT_BROADCAST.to_string()
    }

    fn default_excluded_types() -> Vec<DeviceType> {
        DeviceType::UNSUPPORTED.to_vec()
    }

    /// Check whether discovery reports devices of this type.
    #[must_use]
    pub fn is_supported(&self, device_type: DeviceType) -> bool {
        !self.excluded_types.contains(&device_type)
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            hide_homekit_matter: false,
            default_broadcast: Self::default_broadcast(),
            excluded_types: Self::default_excluded_types(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_request_uses_camel_case() {
        let req: DiscoveryRequest = serde_json::from_str(
            r#"{"additionalBroadcasts":["10.1.255.255"],"manualDevices":["10.0.0.9"]}"#,
        )
        .unwrap();
        assert_eq!(req.additional_broadcasts, vec!["10.1.255.255"]);
        assert_eq!(req.manual_devices, vec!["10.0.0.9"]);

        let empty: DiscoveryRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.additional_broadcasts.is_empty());
    }

    #[test]
    fn control_request_optional_fields() {
        let req: ControlRequest = serde_json::from_str(
            r#"{"host":"10.0.0.2","feature":"state","action":"turn_on"}"#,
        )
        .unwrap();
        assert!(req.value.is_null());
        assert!(req.child_num.is_none());
    }

    #[test]
    fn fleet_config_defaults() {
        let config = FleetConfig::default();
        assert!(!config.hide_homekit_matter);
        assert_eq!(config.default_broadcast, "255.255.255.255");
        assert!(config.is_supported(DeviceType::Plug));
        assert!(!config.is_supported(DeviceType::Camera));
    }
}
