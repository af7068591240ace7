//! Device classification and status snapshots.
//!
//! [`classify`] reads a connected device's current state and produces the
//! wire shape the hub consumes: `sys_info` (identity, then either a child
//! list or the device's own state inline) and `feature_info` (capability
//! flags). Nothing here talks to the device; callers update first.

use hearth_core::{DeviceType, Host};
use hearth_device::{Device, Endpoint, Light, LightFeature};
use serde::Serialize;

use crate::error::{FleetError, Result};

/// Point-in-time status of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Identity and state.
    pub sys_info: SysInfo,
    /// Capability flags.
    pub feature_info: FeatureInfo,
}

/// Identity block plus either children or inline state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SysInfo {
    /// Device alias, or `<device_type>_<host>` when unset.
    pub alias: String,
    /// Number of children.
    pub child_num: usize,
    /// Stable identifier.
    pub device_id: String,
    /// Device kind.
    pub device_type: DeviceType,
    /// Device address.
    pub host: Host,
    /// Hardware version.
    pub hw_ver: String,
    /// MAC address.
    pub mac: String,
    /// Hardware model.
    pub model: String,
    /// Firmware version.
    pub sw_ver: String,
    /// Children or inline state.
    #[serde(flatten)]
    pub body: SysInfoBody,
}

/// The two mutually exclusive shapes of a device's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SysInfoBody {
    /// Multi-outlet devices report their children only.
    Children {
        /// One entry per child, in device order.
        children: Vec<ChildInfo>,
    },
    /// Single devices report their own state.
    Inline(EndpointStatus),
}

/// One child of a multi-outlet device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildInfo {
    /// Child alias.
    pub alias: Option<String>,
    /// Child id with the parent prefix stripped.
    pub id: String,
    /// Power state and capability readings.
    #[serde(flatten)]
    pub status: EndpointStatus,
}

/// Power state plus whatever light and fan readings the endpoint has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStatus {
    /// Power state.
    pub state: bool,
    /// Brightness, when dimmable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    /// Colour temperature, when tunable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
    /// Hue and saturation, when colour-capable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsv: Option<HueSaturation>,
    /// Fan speed, when a fan module is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_speed_level: Option<u8>,
}

/// Hue and saturation of a colour light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HueSaturation {
    /// Hue in degrees.
    pub hue: u16,
    /// Saturation in percent.
    pub saturation: u8,
}

/// Capability flags of a device. All default to false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureInfo {
    /// Dimmable.
    pub brightness: bool,
    /// Tunable white.
    pub color_temp: bool,
    /// Full colour.
    pub hsv: bool,
    /// Has a fan module.
    pub fan: bool,
}

/// Build the full status snapshot of a device.
///
/// # Errors
///
/// Returns `FleetError::Classification` if the device or one of its children
/// reports no power state.
pub fn classify<D: Device>(device: &D) -> Result<StatusSnapshot> {
    Ok(StatusSnapshot {
        sys_info: sys_info(device)?,
        feature_info: feature_info(device),
    })
}

/// Build only the `sys_info` block of a device.
///
/// # Errors
///
/// Returns `FleetError::Classification` if a power state is missing.
pub fn sys_info<D: Device>(device: &D) -> Result<SysInfo> {
    let host = device.host();
    let info = device.info();
    let children = device.children();

    let body = if children.is_empty() {
        SysInfoBody::Inline(endpoint_status(device, host)?)
    } else {
        let children = children
            .iter()
            .map(|child| {
                Ok(ChildInfo {
                    alias: child.alias(),
                    id: strip_parent_prefix(&child.device_id()).to_string(),
                    status: endpoint_status(*child, host)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        SysInfoBody::Children { children }
    };

    // Some devices report their MAC as the library id; the hardware id is
    // the stable one there.
    let device_id = if info.device_id == info.mac {
        info.hardware_id.clone().unwrap_or(info.device_id)
    } else {
        info.device_id
    };

    Ok(SysInfo {
        alias: info
            .alias
            .unwrap_or_else(|| format!("{}_{host}", info.device_type)),
        child_num: children.len(),
        device_id,
        device_type: info.device_type,
        host: host.clone(),
        hw_ver: info.hw_ver,
        mac: info.mac,
        model: info.model,
        sw_ver: info.sw_ver,
        body,
    })
}

/// Capability flags of an endpoint's light and fan modules.
#[must_use]
pub fn feature_info(endpoint: &dyn Endpoint) -> FeatureInfo {
    let mut features = FeatureInfo::default();
    if let Some(light) = endpoint.light() {
        features.brightness = light.has_feature(LightFeature::Brightness);
        features.color_temp = light.has_feature(LightFeature::ColorTemp);
        features.hsv = light.has_feature(LightFeature::Hsv);
    }
    features.fan = endpoint.fan().is_some();
    features
}

fn endpoint_status(endpoint: &dyn Endpoint, host: &Host) -> Result<EndpointStatus> {
    let state = endpoint.is_on().ok_or_else(|| FleetError::Classification {
        host: host.clone(),
        reason: "no power state reported".to_string(),
    })?;

    let mut status = EndpointStatus {
        state,
        brightness: None,
        color_temp: None,
        hsv: None,
        fan_speed_level: endpoint.fan().map(hearth_device::Fan::fan_speed_level),
    };
    if let Some(light) = endpoint.light() {
        read_light(light, &mut status);
    }
    Ok(status)
}

fn read_light(light: &dyn Light, status: &mut EndpointStatus) {
    if light.has_feature(LightFeature::Brightness) {
        status.brightness = light.brightness();
    }
    if light.has_feature(LightFeature::ColorTemp) {
        status.color_temp = light.color_temp();
    }
    if light.has_feature(LightFeature::Hsv) {
        status.hsv = light.hsv().map(|hsv| HueSaturation {
            hue: hsv.hue,
            saturation: hsv.saturation,
        });
    }
}

fn strip_parent_prefix(id: &str) -> &str {
    id.split_once('_').map_or(id, |(_, rest)| rest)
}
