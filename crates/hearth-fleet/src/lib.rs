//! Device connection lifecycle for hearth.
//!
//! This crate owns every live device session and the rules for using them.
//! It sits between the HTTP gateway and a [`DeviceLibrary`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Gateway (HTTP)                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       FleetService                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐   │
//! │  │  Discovery  │ │  Classify   │ │  Command            │   │
//! │  │  Sweep      │ │             │ │  Dispatch           │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘   │
//! │                         │                                   │
//! │                         ▼                                   │
//! │  ┌───────────────────────────────────────────────────────┐ │
//! │  │ SessionResolver (retry once)                          │ │
//! │  │   ConnectionCache · HostLockTable · ConfigStore       │ │
//! │  └───────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  DeviceLibrary (protocol)                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! - At most one cached session per host. Cache mutations require the
//!   host's [`HostGuard`].
//! - Operations on the same host never interleave; different hosts never
//!   block each other.
//! - Reconnect configs survive session loss and are only dropped by
//!   [`Fleet::shutdown`].
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use hearth_core::Host;
//! use hearth_device::{DeviceSpec, SimulatedLibrary};
//! use hearth_fleet::{DiscoveryRequest, Fleet, FleetService};
//!
//! # async fn example() -> hearth_fleet::Result<()> {
//! let lamp = Host::parse("10.0.0.2").unwrap();
//! let library = SimulatedLibrary::with_devices([DeviceSpec::plug(lamp.clone(), "Lamp")]);
//! let fleet = FleetService::with_defaults(Arc::new(library));
//!
//! let report = fleet.discover(DiscoveryRequest::default(), None).await?;
//! assert!(report.contains_key(&lamp));
//!
//! let info = fleet.sys_info(&lamp).await?;
//! assert_eq!(info.alias, "Lamp");
//! # Ok(())
//! # }
//! ```
//!
//! [`DeviceLibrary`]: hearth_device::DeviceLibrary

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod classify;
pub mod command;
pub mod configs;
pub mod connections;
pub mod discovery;
pub mod error;
pub mod locks;
pub mod resolver;
pub mod service;
pub mod types;

pub use classify::{
    ChildInfo, EndpointStatus, FeatureInfo, HueSaturation, StatusSnapshot, SysInfo, SysInfoBody,
};
pub use command::{Command, Power};
pub use configs::ConfigStore;
pub use connections::ConnectionCache;
pub use discovery::{DiscoveryReport, Sweep};
pub use error::{FleetError, Result};
pub use locks::{HostGuard, HostLockTable};
pub use resolver::SessionResolver;
pub use service::{Fleet, FleetService};
pub use types::{ControlRequest, DiscoveryRequest, FleetConfig};
