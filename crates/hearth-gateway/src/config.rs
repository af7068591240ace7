//! Gateway configuration types.
//!
//! Configuration is read from environment variables at startup. Every
//! setting has a default, so an empty environment yields a working server.

use std::time::Duration;

use hearth_fleet::FleetConfig;
use serde::Deserialize;
use thiserror::Error;

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:4000").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Maximum number of requests served at once.
    #[serde(default = "GatewayConfig::default_max_concurrency")]
    pub max_concurrency: usize,

    /// Path of a JSON fleet description for the simulated device library.
    #[serde(default)]
    pub fleet_fixture: Option<String>,
}

/// Invalid configuration value.
#[derive(Debug, Error)]
#[error("invalid value {value:?} for {var}")]
pub struct ConfigError {
    /// Environment variable name.
    pub var: &'static str,
    /// The rejected value.
    pub value: String,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:4000".to_string()
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MB
    }

    const fn default_request_timeout() -> u64 {
        120
    }

    const fn default_max_concurrency() -> usize {
        1000
    }

    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through a variable lookup function.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            listen_addr: lookup("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            max_body_bytes: parse_or(&lookup, "MAX_BODY_BYTES", defaults.max_body_bytes)?,
            request_timeout_seconds: parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            )?,
            max_concurrency: parse_or(&lookup, "MAX_CONCURRENCY", defaults.max_concurrency)?,
            fleet_fixture: lookup("FLEET_FIXTURE").filter(|path| !path.is_empty()),
        })
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
            max_concurrency: Self::default_max_concurrency(),
            fleet_fixture: None,
        }
    }
}

/// Read the fleet settings from the process environment.
#[must_use]
pub fn fleet_config_from_env() -> FleetConfig {
    fleet_config_from_lookup(|name| std::env::var(name).ok())
}

/// Read the fleet settings through a variable lookup function.
///
/// `HIDE_HOMEKIT_MATTER` is enabled only by the value `true` (any case).
#[must_use]
pub fn fleet_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FleetConfig {
    FleetConfig {
        hide_homekit_matter: lookup("HIDE_HOMEKIT_MATTER")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true")),
        ..FleetConfig::default()
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError { var, value }),
        None => Ok(default),
    }
}
