//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use hearth_fleet::Fleet;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
pub struct GatewayState<F>
where
    F: Fleet,
{
    /// The fleet service every device route goes through.
    pub fleet: Arc<F>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<F> GatewayState<F>
where
    F: Fleet,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(fleet: Arc<F>, config: GatewayConfig) -> Self {
        Self { fleet, config }
    }
}

impl<F> Clone for GatewayState<F>
where
    F: Fleet,
{
    fn clone(&self) -> Self {
        Self {
            fleet: Arc::clone(&self.fleet),
            config: self.config.clone(),
        }
    }
}
