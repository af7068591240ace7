//! Host identifiers.
//!
//! A [`Host`] names one device by its network address and is the primary key
//! for every per-device table in the fleet (sessions, locks, reconnect configs).

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Network identifier of one physical device (IP address or hostname).
///
/// Hosts are compared as exact strings; the fleet never resolves or
/// canonicalises them.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Host(String);

impl Host {
    /// Parse a host identifier.
    ///
    /// Leading and trailing whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or contains inner whitespace.
    pub fn parse(s: &str) -> Result<Self, HostError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(HostError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(HostError::InvalidCharacter(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Return the host as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Host({})", self.0)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Host {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Host {
    type Error = HostError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Host> for String {
    fn from(host: Host) -> Self {
        host.0
    }
}

impl AsRef<str> for Host {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Host {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when parsing a host identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The input was empty after trimming.
    #[error("host must not be empty")]
    Empty,

    /// The input contains characters that cannot appear in a host.
    #[error("invalid host: {0:?}")]
    InvalidCharacter(String),
}
