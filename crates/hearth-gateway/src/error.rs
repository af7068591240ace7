//! API error types and responses.
//!
//! Every failure leaves the gateway as a flat `{"error": "<message>"}` body.
//! Route-level failures (unreadable bodies, a failed sweep) use a 500 status
//! and expired requests a 408. Device operation failures are reported with
//! 200 by the handlers, since the hub reads the `error` key rather than the
//! status.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use hearth_fleet::FleetError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body could not be read as the expected JSON.
    #[error("{0}")]
    InvalidBody(String),

    /// The request did not finish within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
}

impl ErrorResponse {
    /// Build a body from any displayable error.
    #[must_use]
    pub fn from_error(err: &impl std::fmt::Display) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::from_error(&self))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "Rejected request body");
        Self::InvalidBody(rejection.body_text())
    }
}

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        tracing::error!(
            error = %err,
            status = err.http_status_code(),
            "Fleet operation failed"
        );
        Self::Internal(err.to_string())
    }
}

/// Report a failed device operation as `200 {"error": ...}`.
#[must_use]
pub fn operation_failed(operation: &'static str, err: &FleetError) -> Response {
    tracing::error!(operation, error = %err, "Device operation failed");
    (StatusCode::OK, Json(ErrorResponse::from_error(err))).into_response()
}
