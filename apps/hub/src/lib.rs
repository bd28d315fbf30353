//! Road condition hub: stores processed readings and pushes updates to websocket clients.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use road_store_sqlite::{SqliteConfig, SqliteStore};

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
mod ws;

pub use config::HubConfig;
pub use routes::{router, Ack, LEGACY_RECORDS_PATH, RECORDS_PATH};
pub use state::AppState;

/// Opens the store, serves until ctrl-c, then tears the subscription registry down.
pub async fn serve(cfg: HubConfig) -> anyhow::Result<()> {
    let store = SqliteStore::open(SqliteConfig { db_path: cfg.db_path.clone(), ..SqliteConfig::default() }).await?;
    let state = AppState::new(Arc::new(store)).with_broadcast_inserts(cfg.broadcast_inserts);
    let subscriptions = state.subscriptions.clone();

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("bind {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, db = %cfg.db_path.display(), "hub listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    subscriptions.shutdown();
    info!("hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
