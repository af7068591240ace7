//! Device endpoint handlers.
//!
//! These handlers expose discovery, status reads, and control for the
//! device fleet. Device operation failures are answered with
//! `200 {"error": ...}`; only unreadable bodies and sweep failures produce
//! a 500.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use hearth_core::Host;
use hearth_fleet::{ControlRequest, DiscoveryReport, DiscoveryRequest, Fleet, SysInfo};

use crate::auth::BasicAuth;
use crate::error::{operation_failed, ApiError};
use crate::extract::JsonBody;
use crate::state::GatewayState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /getSysInfo`.
#[derive(Debug, Deserialize)]
pub struct SysInfoRequest {
    /// Target device.
    pub host: Host,
}

/// Response body for `POST /getSysInfo`.
#[derive(Debug, Serialize)]
pub struct SysInfoResponse {
    /// The refreshed device status.
    pub sys_info: SysInfo,
}

/// Response body for a successful `POST /controlDevice`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Always `success`.
    pub status: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

/// Sweep the network and report every supported device, keyed by host.
///
/// Credentials for newer devices come from an optional Basic auth header.
///
/// # Example
///
/// ```text
/// POST /discover
/// {"additionalBroadcasts": ["192.168.2.255"], "manualDevices": ["10.0.0.7"]}
///
/// Response: 200 OK
/// {"10.0.0.7": {"sys_info": {...}, "feature_info": {...}}}
/// ```
pub async fn discover<F>(
    State(state): State<Arc<GatewayState<F>>>,
    BasicAuth(credentials): BasicAuth,
    JsonBody(request): JsonBody<DiscoveryRequest>,
) -> Result<Json<DiscoveryReport>, ApiError>
where
    F: Fleet + 'static,
{
    let report = state.fleet.discover(request, credentials).await?;
    tracing::info!(devices = report.len(), "Discovery finished");
    Ok(Json(report))
}

/// Refresh one device and return its `sys_info`.
pub async fn get_sys_info<F>(
    State(state): State<Arc<GatewayState<F>>>,
    JsonBody(request): JsonBody<SysInfoRequest>,
) -> Response
where
    F: Fleet + 'static,
{
    match state.fleet.sys_info(&request.host).await {
        Ok(sys_info) => Json(SysInfoResponse { sys_info }).into_response(),
        Err(err) => operation_failed("get_sys_info", &err),
    }
}

/// Run one command against a device or one of its children.
///
/// # Example
///
/// ```text
/// POST /controlDevice
/// {"host": "10.0.0.2", "feature": "brightness", "action": "set_brightness", "value": 40}
///
/// Response: 200 OK
/// {"status": "success"}
/// ```
pub async fn control_device<F>(
    State(state): State<Arc<GatewayState<F>>>,
    JsonBody(request): JsonBody<ControlRequest>,
) -> Response
where
    F: Fleet + 'static,
{
    match state.fleet.control(&request).await {
        Ok(()) => Json(StatusResponse { status: "success" }).into_response(),
        Err(err) => operation_failed("control_device", &err),
    }
}
