//! Error types for the device library boundary.

use hearth_core::Host;
use thiserror::Error;

/// Errors raised by a device library or by a live device session.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device rejected the supplied credentials.
    #[error("authentication failed for {host}: {message}")]
    Authentication {
        /// The device that rejected the login.
        host: Host,
        /// Library-provided detail.
        message: String,
    },

    /// The device answered but speaks a protocol the library cannot handle.
    #[error("unsupported device at {0}")]
    Unsupported(Host),

    /// Network-level failure (refused, reset, unreachable).
    #[error("transport error: {0}")]
    Transport(String),

    /// The device did not answer in time.
    #[error("request timed out")]
    Timeout,

    /// The session was closed or went stale and must not be reused.
    #[error("session closed")]
    SessionClosed,

    /// The addressed capability is not present on the device.
    #[error("{0} is not supported by this device")]
    NotSupported(&'static str),

    /// The device refused a value outside its accepted range.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// I/O error while loading library configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading library configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeviceError {
    /// Check if this error indicates a broken or stale session.
    ///
    /// Such failures are worth one reconnect; the others are not going to
    /// change on a fresh session.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout | Self::SessionClosed)
    }

    /// Check if this error is an authentication failure.
    #[must_use]
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Check if this error reports an unsupported device.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

/// A specialized Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;
