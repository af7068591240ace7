//! HTTP gateway for the hearth device fleet.
//!
//! This crate is the surface the home-automation hub talks to. It handles:
//!
//! - Discovery sweeps with optional Basic-auth device credentials
//! - Status reads and device control over JSON POST routes
//! - Request size, timeout, and concurrency limits
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Home Automation Hub                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ HTTP / JSON
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       hearth-gateway                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │ Basic Auth  │ │   Router    │ │   Error Rendering   │    │
//! │  │  Extractor  │ │  + Handlers │ │   {"error": ...}    │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                    ┌──────────────────┐
//!                    │   hearth-fleet   │
//!                    │  (Fleet trait)   │
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hearth_device::SimulatedLibrary;
//! use hearth_fleet::FleetService;
//! use hearth_gateway::{create_router, GatewayConfig, GatewayState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let library = Arc::new(SimulatedLibrary::from_fixture("/etc/hearth/fleet.json")?);
//! let fleet = Arc::new(FleetService::with_defaults(library));
//!
//! let state = GatewayState::new(fleet, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:4000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ConfigError, GatewayConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;

// Re-export key types for convenience
pub use auth::BasicAuth;
