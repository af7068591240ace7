//! Command parsing and dispatch.
//!
//! A control request names a feature, an action and a JSON value. [`Command`]
//! turns that triple into a typed variant up front, so an unknown pair is
//! rejected before any lock is taken or any device is touched. [`dispatch`]
//! then checks the target's capabilities and makes exactly one setter call.

use hearth_device::{Device, Endpoint, Hsv, Light, LightFeature};
use serde_json::Value;

use crate::error::{FleetError, Result};

/// Power toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    /// `turn_on`.
    On,
    /// `turn_off`.
    Off,
}

/// A validated control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch the target on or off.
    State(Power),
    /// Brightness: 0 switches off, 1-100 sets, anything else switches on.
    Brightness(i64),
    /// Colour temperature, clamped to the light's range.
    ColorTemp(i64),
    /// Fan speed, with the same policy as brightness.
    FanSpeedLevel(i64),
    /// Replace the hue, keeping saturation and value.
    Hue(u16),
    /// Replace the saturation, keeping hue and value.
    Saturation(u8),
}

impl Command {
    /// Parse a feature/action/value triple.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::InvalidCommand` for an unknown feature/action pair
    /// and `FleetError::InvalidValue` for a value of the wrong shape.
    pub fn parse(feature: &str, action: &str, value: &Value) -> Result<Self> {
        match (feature, action) {
            ("state", "turn_on") => Ok(Self::State(Power::On)),
            ("state", "turn_off") => Ok(Self::State(Power::Off)),
            ("brightness", "set_brightness") => integer("brightness", value).map(Self::Brightness),
            ("color_temp", "set_color_temp") => integer("color_temp", value).map(Self::ColorTemp),
            ("fan_speed_level", "set_fan_speed_level") => {
                integer("fan_speed_level", value).map(Self::FanSpeedLevel)
            }
            ("hue", "set_hsv") => {
                let hue = component("hue", value, 360)?;
                Ok(Self::Hue(u16::try_from(hue).map_err(|_| out_of_range("hue", hue))?))
            }
            ("saturation", "set_hsv") => {
                let saturation = component("saturation", value, 100)?;
                Ok(Self::Saturation(
                    u8::try_from(saturation).map_err(|_| out_of_range("saturation", saturation))?,
                ))
            }
            _ => Err(FleetError::InvalidCommand {
                feature: feature.to_string(),
                action: action.to_string(),
            }),
        }
    }

    /// The feature this command addresses.
    #[must_use]
    pub const fn feature(&self) -> &'static str {
        match self {
            Self::State(_) => "state",
            Self::Brightness(_) => "brightness",
            Self::ColorTemp(_) => "color_temp",
            Self::FanSpeedLevel(_) => "fan_speed_level",
            Self::Hue(_) => "hue",
            Self::Saturation(_) => "saturation",
        }
    }

    /// The action name this command was parsed from.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::State(Power::On) => "turn_on",
            Self::State(Power::Off) => "turn_off",
            Self::Brightness(_) => "set_brightness",
            Self::ColorTemp(_) => "set_color_temp",
            Self::FanSpeedLevel(_) => "set_fan_speed_level",
            Self::Hue(_) | Self::Saturation(_) => "set_hsv",
        }
    }

    fn unsupported(&self) -> FleetError {
        FleetError::InvalidCommand {
            feature: self.feature().to_string(),
            action: self.action().to_string(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integer(feature: &'static str, value: &Value) -> Result<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or_else(|| FleetError::InvalidValue {
            feature,
            message: format!("expected a number, got {value}"),
        })
}

/// Read `{"<key>": n}` and check `0 <= n <= max`.
fn component(key: &'static str, value: &Value, max: i64) -> Result<i64> {
    let raw = value.get(key).ok_or_else(|| FleetError::InvalidValue {
        feature: key,
        message: format!("expected an object with a \"{key}\" field"),
    })?;
    let n = integer(key, raw)?;
    if (0..=max).contains(&n) {
        Ok(n)
    } else {
        Err(out_of_range(key, n))
    }
}

fn out_of_range(feature: &'static str, n: i64) -> FleetError {
    FleetError::InvalidValue {
        feature,
        message: format!("{n} is out of range"),
    }
}

/// Outcome of the zero/range/else policy shared by brightness and fan speed.
enum Level {
    Off,
    Set(u8),
    On,
}

impl Level {
    fn from_value(value: i64) -> Self {
        match value {
            0 => Self::Off,
            1..=100 => u8::try_from(value).map_or(Self::On, Self::Set),
            _ => Self::On,
        }
    }
}

/// Run a command against a device or one of its children.
///
/// # Errors
///
/// Returns `FleetError::ChildOutOfRange` for a bad child index,
/// `FleetError::InvalidCommand` if the target lacks the capability, or the
/// device error from the setter call.
pub async fn dispatch<D: Device>(device: &D, command: &Command, child: Option<usize>) -> Result<()> {
    let children = device.children();
    let target: &dyn Endpoint = match child {
        Some(index) => *children.get(index).ok_or(FleetError::ChildOutOfRange {
            index,
            count: children.len(),
        })?,
        None => device,
    };

    tracing::debug!(
        host = %device.host(),
        child = ?child,
        feature = command.feature(),
        action = command.action(),
        "Dispatching command"
    );
    apply(target, command).await
}

async fn apply(target: &dyn Endpoint, command: &Command) -> Result<()> {
    match *command {
        Command::State(Power::On) => target.turn_on().await?,
        Command::State(Power::Off) => target.turn_off().await?,
        Command::Brightness(value) => {
            let light = light_with(target, LightFeature::Brightness, command)?;
            match Level::from_value(value) {
                Level::Off => target.turn_off().await?,
                Level::Set(level) => light.set_brightness(level).await?,
                Level::On => target.turn_on().await?,
            }
        }
        Command::ColorTemp(value) => {
            let light = light_with(target, LightFeature::ColorTemp, command)?;
            let kelvin = light.valid_temperature_range().clamp(value);
            light.set_color_temp(kelvin).await?;
        }
        Command::FanSpeedLevel(value) => {
            let fan = target.fan().ok_or_else(|| command.unsupported())?;
            match Level::from_value(value) {
                Level::Off => target.turn_off().await?,
                Level::Set(level) => fan.set_fan_speed_level(level).await?,
                Level::On => target.turn_on().await?,
            }
        }
        Command::Hue(hue) => {
            let light = light_with(target, LightFeature::Hsv, command)?;
            let current = current_hsv(light, command)?;
            light.set_hsv(Hsv { hue, ..current }).await?;
        }
        Command::Saturation(saturation) => {
            let light = light_with(target, LightFeature::Hsv, command)?;
            let current = current_hsv(light, command)?;
            light.set_hsv(Hsv { saturation, ..current }).await?;
        }
    }
    Ok(())
}

fn light_with<'a>(
    target: &'a dyn Endpoint,
    feature: LightFeature,
    command: &Command,
) -> Result<&'a dyn Light> {
    target
        .light()
        .filter(|light| light.has_feature(feature))
        .ok_or_else(|| command.unsupported())
}

fn current_hsv(light: &dyn Light, command: &Command) -> Result<Hsv> {
    light.hsv().ok_or_else(|| command.unsupported())
}
