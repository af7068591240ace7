//! Device vocabulary shared by the device library boundary and the fleet.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::host::Host;

/// Kind of device as reported by the device library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Smart plug with a single outlet.
    Plug,
    /// Smart bulb.
    Bulb,
    /// Power strip with independently switchable sockets.
    Strip,
    /// One socket of a power strip.
    StripSocket,
    /// In-wall dimmer.
    Dimmer,
    /// LED light strip.
    LightStrip,
    /// In-wall switch.
    WallSwitch,
    /// Camera.
    Camera,
    /// Battery sensor.
    Sensor,
    /// Hub that bridges other devices.
    Hub,
    /// Ceiling or standing fan.
    Fan,
    /// Thermostat or radiator valve.
    Thermostat,
    /// Robot vacuum.
    Vacuum,
    /// Anything the library could not classify.
    Unknown,
}

impl DeviceType {
    /// Device types that are excluded from discovery results by default.
    pub const UNSUPPORTED: [Self; 7] = [
        Self::Camera,
        Self::Sensor,
        Self::Hub,
        Self::Fan,
        Self::Thermostat,
        Self::Vacuum,
        Self::Unknown,
    ];

    /// The wire name of this device type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plug => "plug",
            Self::Bulb => "bulb",
            Self::Strip => "strip",
            Self::StripSocket => "stripsocket",
            Self::Dimmer => "dimmer",
            Self::LightStrip => "lightstrip",
            Self::WallSwitch => "wallswitch",
            Self::Camera => "camera",
            Self::Sensor => "sensor",
            Self::Hub => "hub",
            Self::Fan => "fan",
            Self::Thermostat => "thermostat",
            Self::Vacuum => "vacuum",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username/password pair used to authenticate against newer devices.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account username (usually an email address).
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Create credentials from a username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build credentials only when both parts are present and non-empty.
    #[must_use]
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Self { username, password })
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Transport encryption negotiated with a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EncryptionType {
    /// Legacy XOR obfuscation.
    #[default]
    Xor,
    /// KLAP handshake.
    Klap,
    /// AES with RSA key exchange.
    Aes,
}

/// Protocol hints that let the library skip discovery when reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParameters {
    /// Device family string reported during discovery.
    pub device_family: String,
    /// Transport encryption.
    #[serde(default)]
    pub encryption_type: EncryptionType,
    /// Login protocol version, if the device uses one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_version: Option<u8>,
    /// Whether the device speaks HTTPS.
    #[serde(default)]
    pub https: bool,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            device_family: "IOT.SMARTPLUGSWITCH".to_string(),
            encryption_type: EncryptionType::Xor,
            login_version: None,
            https: false,
        }
    }
}

/// Minimal parameters needed to re-establish a session without rediscovery.
///
/// Credentials are kept in memory only and never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device address.
    pub host: Host,
    /// Port to use instead of the protocol default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_override: Option<u16>,
    /// Credentials to authenticate with.
    #[serde(skip)]
    pub credentials: Option<Credentials>,
    /// Protocol hints.
    #[serde(default)]
    pub connection_type: ConnectionParameters,
}

impl DeviceConfig {
    /// Create a config for a host with default protocol hints.
    #[must_use]
    pub fn new(host: Host) -> Self {
        Self {
            host,
            port_override: None,
            credentials: None,
            connection_type: ConnectionParameters::default(),
        }
    }

    /// Attach credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&DeviceType::StripSocket).unwrap(),
            "\"stripsocket\""
        );
        let parsed: DeviceType = serde_json::from_str("\"wallswitch\"").unwrap();
        assert_eq!(parsed, DeviceType::WallSwitch);
        assert_eq!(DeviceType::LightStrip.to_string(), "lightstrip");
    }

    #[test]
    fn unsupported_types() {
        assert!(DeviceType::UNSUPPORTED.contains(&DeviceType::Camera));
        assert!(!DeviceType::UNSUPPORTED.contains(&DeviceType::Plug));
        assert!(!DeviceType::UNSUPPORTED.contains(&DeviceType::Strip));
    }

    #[test]
    fn credentials_require_both_parts() {
        assert!(Credentials::from_parts(Some("a@b.c".into()), Some("pw".into())).is_some());
        assert!(Credentials::from_parts(Some("a@b.c".into()), None).is_none());
        assert!(Credentials::from_parts(None, Some("pw".into())).is_none());
        assert!(Credentials::from_parts(Some(String::new()), Some("pw".into())).is_none());
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("me@example.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn device_config_never_serializes_credentials() {
        let config = DeviceConfig::new(Host::parse("10.0.0.2").unwrap())
            .with_credentials(Some(Credentials::new("u", "secret")));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));

        let parsed: DeviceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.host, config.host);
        assert!(parsed.credentials.is_none());
    }

    #[test]
    fn device_config_defaults_from_minimal_json() {
        let parsed: DeviceConfig = serde_json::from_str(r#"{"host":"10.0.0.9"}"#).unwrap();
        assert_eq!(parsed.connection_type, ConnectionParameters::default());
        assert_eq!(parsed.port_override, None);
    }
}
