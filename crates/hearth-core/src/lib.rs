//! Core types and utilities for hearth.
//!
//! This crate provides the foundational types used throughout the hearth
//! device control plane:
//!
//! - **Hosts**: the network identifier every per-device table is keyed by
//! - **Device vocabulary**: device types, credentials and reconnect configs
//!
//! # Example
//!
//! ```
//! use hearth_core::{DeviceConfig, DeviceType, Host};
//!
//! let host = Host::parse("192.168.1.20").unwrap();
//! let config = DeviceConfig::new(host.clone());
//! assert_eq!(config.host, host);
//! assert!(DeviceType::UNSUPPORTED.contains(&DeviceType::Camera));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod device;
pub mod host;

pub use device::{ConnectionParameters, Credentials, DeviceConfig, DeviceType, EncryptionType};
pub use host::{Host, HostError};
