//! Stock Dashboard API Server
//!
//! HTTP API server that aggregates data from the dashboard's backend
//! analysis services.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use dashboard_core::{DashboardConfig, Service};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    let config = DashboardConfig::from_env()?;

    // Initialize logging
    let default_filter = if config.debug {
        "debug"
    } else {
        "info,dashboard_api=debug"
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    info!("Starting Stock Dashboard API");
    for service in Service::ALL {
        info!("{} service: {}", service, config.endpoints.base_url(service));
    }
    if config.use_mock_data {
        warn!(
            "Mock data enabled; per-ticker data is served from demo payloads after {}ms",
            config.mock_delay.as_millis()
        );
    }

    let state = AppState::new(&config);

    // Keep the health snapshot fresh in the background
    let poller = Arc::clone(&state.health).start_polling(config.health_poll_interval);

    let app = routes::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
