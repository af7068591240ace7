//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::error_handling::HandleErrorLayer;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use hearth_fleet::Fleet;

use crate::error::ApiError;
use crate::handlers::{devices, health};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// - `GET /health` - Health check
/// - `POST /discover` - Sweep the network for devices
/// - `POST /getSysInfo` - Refresh and read one device
/// - `POST /controlDevice` - Run one command against a device
pub fn create_router<F>(state: GatewayState<F>) -> Router
where
    F: Fleet + 'static,
{
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();
    let max_concurrency = state.config.max_concurrency;

    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health::health))
        .route("/discover", post(devices::discover::<F>))
        .route("/getSysInfo", post(devices::get_sys_info::<F>))
        .route("/controlDevice", post(devices::control_device::<F>))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(ConcurrencyLimitLayer::new(max_concurrency))
        .with_state(state)
}

/// Render middleware failures as `{"error": ...}`.
async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        tracing::warn!("Request timed out");
        ApiError::Timeout
    } else {
        ApiError::Internal(err.to_string())
    }
}
