//! # Puesto Media API
//!
//! Image deletion endpoint for the product catalog.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Media API Server                                 │
//! │                                                                         │
//! │  Device ───► HTTP (3000) ───► deleteImage ───► media host destroy      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use puesto_inventory::{CloudinaryClient, SigningCredentials};
use puesto_media_api::{router, AppState, MediaApiConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Unused by destroy, which is a signed call.
const UPLOAD_PRESET: &str = "product";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,puesto=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    info!("Starting Puesto Media API...");

    // Load configuration
    let config = MediaApiConfig::load()?;
    let addr = config.socket_addr()?;
    info!(
        port = config.port,
        cloud_name = %config.cloud_name,
        api_base = %config.api_base,
        "Configuration loaded"
    );

    let destroyer = CloudinaryClient::new(
        config.api_base.clone(),
        config.cloud_name.clone(),
        UPLOAD_PRESET,
    )
    .with_credentials(SigningCredentials {
        api_key: config.api_key.clone(),
        api_secret: config.api_secret.clone(),
    });

    let app = router(AppState {
        destroyer: Arc::new(destroyer),
    });

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
