//! Error types for fleet operations.
//!
//! This module defines all errors that can occur while resolving sessions,
//! classifying devices and dispatching commands.

use hearth_core::Host;
use hearth_device::DeviceError;
use thiserror::Error;

/// A result type using `FleetError`.
pub type Result<T> = std::result::Result<T, FleetError>;

/// Errors that can occur in fleet operations.
#[derive(Debug, Error)]
pub enum FleetError {
    /// The host has neither a live session nor a reconnect config.
    #[error("unknown host {0}: run discovery first")]
    UnknownHost(Host),

    /// A child index past the end of the device's child list.
    #[error("child index {index} out of range: device has {count} children")]
    ChildOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of children the device reports.
        count: usize,
    },

    /// The feature/action pair is unknown or the target lacks the capability.
    #[error("Invalid feature or action: {feature}/{action}")]
    InvalidCommand {
        /// Requested feature.
        feature: String,
        /// Requested action.
        action: String,
    },

    /// The command value has the wrong shape for its feature.
    #[error("invalid value for {feature}: {message}")]
    InvalidValue {
        /// Feature the value was meant for.
        feature: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// The device's reported state cannot be turned into a status snapshot.
    #[error("cannot classify device {host}: {reason}")]
    Classification {
        /// The device being classified.
        host: Host,
        /// Why classification failed.
        reason: String,
    },

    /// Device library error.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FleetError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::UnknownHost(_) => 404,
            Self::ChildOutOfRange { .. } | Self::InvalidCommand { .. } | Self::InvalidValue { .. } => {
                400
            }
            Self::Device(DeviceError::Authentication { .. }) => 401,
            Self::Classification { .. } | Self::Device(_) => 502,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if a fresh session might make this error go away.
    ///
    /// Only broken or stale sessions qualify, as decided by
    /// [`DeviceError::is_transport`].
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Device(err) => err.is_transport(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Host {
        Host::parse("10.0.0.1").unwrap()
    }

    #[test]
    fn error_status_codes() {
        assert_eq!(FleetError::UnknownHost(host()).http_status_code(), 404);
        assert_eq!(
            FleetError::ChildOutOfRange { index: 4, count: 2 }.http_status_code(),
            400
        );
        assert_eq!(
            FleetError::Device(DeviceError::Authentication {
                host: host(),
                message: "nope".into()
            })
            .http_status_code(),
            401
        );
        assert_eq!(FleetError::Device(DeviceError::Timeout).http_status_code(), 502);
    }

    #[test]
    fn only_device_failures_retry() {
        assert!(FleetError::Device(DeviceError::Transport("reset".into())).is_retriable());
        assert!(FleetError::Device(DeviceError::SessionClosed).is_retriable());
        assert!(FleetError::Device(DeviceError::Timeout).is_retriable());
        assert!(!FleetError::Device(DeviceError::NotSupported("fan")).is_retriable());
        assert!(!FleetError::Device(DeviceError::Unsupported(host())).is_retriable());
        assert!(!FleetError::Device(DeviceError::Authentication {
            host: host(),
            message: "bad password".into()
        })
        .is_retriable());
        assert!(!FleetError::UnknownHost(host()).is_retriable());
        assert!(!FleetError::InvalidCommand {
            feature: "state".into(),
            action: "explode".into()
        }
        .is_retriable());
    }

    #[test]
    fn invalid_command_message() {
        let err = FleetError::InvalidCommand {
            feature: "brightness".into(),
            action: "set_brightness".into(),
        };
        assert!(err.to_string().starts_with("Invalid feature or action"));
    }
}
