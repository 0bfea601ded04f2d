//! Aureo Server - REST API for golden-spiral image sealing
//!
//! Exposes aureo-core functionality via HTTP endpoints:
//! - POST /seal   - Embed a seal into an uploaded image
//! - POST /detect - Look for a seal in an uploaded image
//! - GET  /health - Service status and seal metrics
//! - GET  /ready  - Readiness probe

use std::net::SocketAddr;

use aureo_server::{create_router_with_config, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("aureo_server=info,aureo_core=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    let addr = config.socket_addr();
    let app = create_router_with_config(&config);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "Listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = served {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
