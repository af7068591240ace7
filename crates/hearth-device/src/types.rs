//! Value types exchanged with the device library.

use hearth_core::DeviceType;
use serde::{Deserialize, Serialize};

/// Identity block reported by a device after a successful update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// User-assigned name, if any.
    pub alias: Option<String>,
    /// Device kind.
    pub device_type: DeviceType,
    /// Hardware model string.
    pub model: String,
    /// MAC address.
    pub mac: String,
    /// Library-level device identifier.
    pub device_id: String,
    /// Hardware `deviceId` from the raw system info, when the device reports one.
    pub hardware_id: Option<String>,
    /// Hardware version.
    pub hw_ver: String,
    /// Firmware version.
    pub sw_ver: String,
}

/// Optional module surfaces that are not controlled through the fleet but
/// influence whether a device is reported at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Native Apple HomeKit pairing.
    HomeKit,
    /// Native Matter support.
    Matter,
}

/// Sub-features of a light module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightFeature {
    /// Dimming.
    Brightness,
    /// Tunable white.
    ColorTemp,
    /// Full colour.
    Hsv,
}

impl LightFeature {
    /// The capability name used in error messages and feature flags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::ColorTemp => "color_temp",
            Self::Hsv => "hsv",
        }
    }
}

/// Hue (degrees), saturation (percent) and value (percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue in degrees, 0-360.
    pub hue: u16,
    /// Saturation, 0-100.
    pub saturation: u8,
    /// Value (brightness), 0-100.
    pub value: u8,
}

impl Hsv {
    /// Create a new colour triple.
    #[must_use]
    pub const fn new(hue: u16, saturation: u8, value: u8) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }
}

/// Colour temperature range (Kelvin) accepted by a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTempRange {
    /// Warmest supported temperature.
    pub min: u16,
    /// Coolest supported temperature.
    pub max: u16,
}

impl ColorTempRange {
    /// Clamp a requested temperature into this range.
    #[must_use]
    pub fn clamp(&self, kelvin: i64) -> u16 {
        let clamped = kelvin.max(i64::from(self.min)).min(i64::from(self.max));
        u16::try_from(clamped).unwrap_or(self.max)
    }

    /// Check whether a temperature lies in the range.
    #[must_use]
    pub const fn contains(&self, kelvin: u16) -> bool {
        kelvin >= self.min && kelvin <= self.max
    }
}

impl Default for ColorTempRange {
    fn default() -> Self {
        Self {
            min: 2500,
            max: 6500,
        }
    }
}
