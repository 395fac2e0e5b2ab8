use std::net::SocketAddr;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::{
    services::{health, sync_measurements, sync_orders, webhook_measurements, webhook_orders},
    state::AppState,
};
use crate::config::Config;
use crate::ledger::JobLedger;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build the full application router for the given state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/orders.updated", post(webhook_orders))
        .route("/webhooks/measurements.updated", post(webhook_measurements))
        .route("/sync/orders", post(sync_orders))
        .route("/sync/measurements", post(sync_measurements))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn run(address: SocketAddr) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;

    if config.webhook.secret.is_none() {
        warn!("WEBHOOK_SECRET is not set; all inbound webhooks will fail verification");
    }

    info!(path = %config.server.ledger_path.display(), "Opening job ledger");
    let ledger = JobLedger::open(&config.server.ledger_path)
        .map_err(|e| format!("Failed to open job ledger: {}", e))?;

    let state = AppState::from_config(config, ledger)
        .map_err(|e| format!("Failed to initialize clients: {}", e))?;

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "hookrelay API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
