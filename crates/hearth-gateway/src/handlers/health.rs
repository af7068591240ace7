//! Health check endpoint.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
}

/// Health check handler.
///
/// Answers without touching the fleet, so it stays responsive during a
/// long discovery sweep.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {"status": "healthy"}
/// ```
pub async fn health() -> impl IntoResponse {
    let response = HealthResponse { status: "healthy" };

    (StatusCode::OK, Json(response))
}
