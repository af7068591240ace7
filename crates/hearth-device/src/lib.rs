//! Device library boundary for hearth.
//!
//! The fleet drives devices exclusively through the traits in [`library`]:
//!
//! - [`DeviceLibrary`]: broadcast discovery, single-host discovery and
//!   direct connection from a reconnect config
//! - [`Device`]: one live session with identity, children and modules
//! - [`Endpoint`], [`Light`], [`Fan`]: the switchable surfaces a command can
//!   address
//!
//! [`SimulatedLibrary`] is an in-memory implementation used by tests and by
//! the gateway binary when it runs against a fixture file.
//!
//! # Example
//!
//! ```
//! use hearth_core::{DeviceConfig, Host};
//! use hearth_device::{DeviceLibrary, DeviceSpec, Endpoint, SimulatedLibrary};
//!
//! # async fn example() -> hearth_device::Result<()> {
//! let host = Host::parse("10.0.0.2").unwrap();
//! let library = SimulatedLibrary::with_devices([DeviceSpec::plug(host.clone(), "Lamp")]);
//!
//! let lamp = library.connect(&DeviceConfig::new(host.clone())).await?;
//! lamp.turn_on().await?;
//! assert_eq!(library.device(&host).unwrap().endpoint.state, Some(true));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod library;
pub mod simulated;
pub mod types;

pub use error::{DeviceError, Result};
pub use library::{Device, DeviceLibrary, Endpoint, Fan, Light};
pub use simulated::{
    Call, CallRecord, DeviceSpec, EndpointSpec, FanSpec, LightSpec, SessionStats,
    SimulatedDevice, SimulatedLibrary, DEFAULT_BROADCAST,
};
pub use types::{ColorTempRange, DeviceInfo, Hsv, LightFeature, ModuleKind};
