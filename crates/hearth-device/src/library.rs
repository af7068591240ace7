//! Device library interface.
//!
//! The fleet never speaks a device protocol itself. It drives devices through
//! these traits, which a protocol library (or [`SimulatedLibrary`]) implements.
//!
//! [`SimulatedLibrary`]: crate::SimulatedLibrary

use async_trait::async_trait;
use futures::stream::BoxStream;
use hearth_core::{Credentials, DeviceConfig, Host};

use crate::types::{ColorTempRange, DeviceInfo, Hsv, LightFeature, ModuleKind};
use crate::Result;

/// Entry point of a device library: discovery and direct connection.
#[async_trait]
pub trait DeviceLibrary: Send + Sync + 'static {
    /// The session handle type produced by this library.
    type Device: Device;

    /// Open a session from a reconnect config without discovery.
    ///
    /// The returned handle has already fetched its state once.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is unreachable or rejects the session.
    async fn connect(&self, config: &DeviceConfig) -> Result<Self::Device>;

    /// Broadcast discovery on `target`, yielding each device as it answers.
    ///
    /// Yielded handles have not been updated yet. A failure of the broadcast
    /// itself is yielded as an `Err` item.
    fn discover<'a>(
        &'a self,
        target: &'a str,
        credentials: Option<&'a Credentials>,
    ) -> BoxStream<'a, Result<Self::Device>>;

    /// Discover a single device by address.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing answers at `host`.
    async fn discover_single(
        &self,
        host: &Host,
        credentials: Option<&Credentials>,
    ) -> Result<Self::Device>;
}

/// Something that can be switched and carries capability modules: either a
/// whole device or one child of a multi-outlet device.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// User-assigned name, if any.
    fn alias(&self) -> Option<String>;

    /// Library-level identifier of this endpoint.
    fn device_id(&self) -> String;

    /// Last reported power state. `None` if the endpoint has no state feature.
    fn is_on(&self) -> Option<bool>;

    /// The light module, if present.
    fn light(&self) -> Option<&dyn Light>;

    /// The fan module, if present.
    fn fan(&self) -> Option<&dyn Fan>;

    /// Switch on.
    async fn turn_on(&self) -> Result<()>;

    /// Switch off.
    async fn turn_off(&self) -> Result<()>;
}

/// One live, authenticated session to a device.
///
/// A handle is unusable after [`Device::disconnect`]; callers must drop every
/// reference to it.
#[async_trait]
pub trait Device: Endpoint + 'static {
    /// The address this session talks to.
    fn host(&self) -> &Host;

    /// Identity block from the last update.
    fn info(&self) -> DeviceInfo;

    /// Parameters that reconnect to this device without discovery.
    fn config(&self) -> DeviceConfig;

    /// Child endpoints, in device order. Empty for single-outlet devices.
    fn children(&self) -> Vec<&dyn Endpoint>;

    /// Whether an optional module is present.
    fn has_module(&self, module: ModuleKind) -> bool;

    /// Refresh state from the device.
    async fn update(&self) -> Result<()>;

    /// Close the session.
    async fn disconnect(&self) -> Result<()>;
}

/// Light capability module.
#[async_trait]
pub trait Light: Send + Sync {
    /// Whether the light supports a sub-feature.
    fn has_feature(&self, feature: LightFeature) -> bool;

    /// Current brightness, 0-100.
    fn brightness(&self) -> Option<u8>;

    /// Current colour temperature in Kelvin.
    fn color_temp(&self) -> Option<u16>;

    /// Accepted colour temperature range.
    fn valid_temperature_range(&self) -> ColorTempRange;

    /// Current colour.
    fn hsv(&self) -> Option<Hsv>;

    /// Set brightness, 0-100.
    async fn set_brightness(&self, brightness: u8) -> Result<()>;

    /// Set colour temperature in Kelvin.
    async fn set_color_temp(&self, kelvin: u16) -> Result<()>;

    /// Set colour.
    async fn set_hsv(&self, hsv: Hsv) -> Result<()>;
}

/// Fan capability module.
#[async_trait]
pub trait Fan: Send + Sync {
    /// Current speed level.
    fn fan_speed_level(&self) -> u8;

    /// Set speed level.
    async fn set_fan_speed_level(&self, level: u8) -> Result<()>;
}
