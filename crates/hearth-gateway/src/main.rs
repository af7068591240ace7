//! Hearth Gateway - HTTP API for the device fleet
//!
//! This is the main entry point for the gateway service.
//!
//! # Environment
//!
//! - `LISTEN_ADDR` - bind address (default `0.0.0.0:4000`)
//! - `FLEET_FIXTURE` - JSON fleet description for the simulated library
//! - `HIDE_HOMEKIT_MATTER` - `true` to hide devices with native HomeKit/Matter
//! - `REQUEST_TIMEOUT_SECONDS`, `MAX_BODY_BYTES`, `MAX_CONCURRENCY`

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hearth_device::SimulatedLibrary;
use hearth_fleet::{Fleet, FleetService};
use hearth_gateway::config::fleet_config_from_env;
use hearth_gateway::{create_router, GatewayConfig, GatewayState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hearth=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Hearth Gateway");

    let config = GatewayConfig::from_env()?;
    let fleet_config = fleet_config_from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        fleet_fixture = ?config.fleet_fixture,
        hide_homekit_matter = fleet_config.hide_homekit_matter,
        "Gateway configuration loaded"
    );

    let library = match &config.fleet_fixture {
        Some(path) => SimulatedLibrary::from_fixture(path)?,
        None => {
            tracing::warn!("No FLEET_FIXTURE set - starting with an empty fleet");
            SimulatedLibrary::new()
        }
    };

    let fleet = Arc::new(FleetService::new(Arc::new(library), fleet_config));
    let listen_addr = config.listen_addr.clone();
    let app = create_router(GatewayState::new(Arc::clone(&fleet), config));

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    fleet.shutdown().await;
    tracing::info!("Gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
