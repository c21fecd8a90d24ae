mod api;
mod config;
mod geo;
mod service;
mod store;
mod store_manager;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::config::Config;
use crate::geo::IpGeolocationClient;
use crate::service::{CredentialStore, LogStore, PresenceStore};
use crate::store::db::StoreDb;
use crate::store_manager::StoreHandle;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("connlog_apid=info,tower_http=info"))
        )
        .init();

    tracing::info!("Starting connlog-apid");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/connlog/apid.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    if config.geolocation.api_key.is_empty() {
        tracing::warn!("No geolocation API key configured; lookups will likely fail and entries stay unenriched");
    }

    let db = StoreDb::open(&config.store.db_path)?;
    tracing::info!("Opened database at {:?}", config.store.db_path);

    let store = StoreHandle::spawn(db);

    let geo = IpGeolocationClient::new(&config.geolocation)
        .context("Failed to create geolocation client")?;

    let app_state = api::routes::AppState {
        logs: LogStore::new(store.clone(), Arc::new(geo)),
        presence: PresenceStore::new(store.clone()),
        credentials: CredentialStore::new(store.clone(), config.auth.bcrypt_cost),
        request_timeout: Duration::from_secs(config.api.request_timeout_secs),
    };
    let app = api::routes::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    let cancel = CancellationToken::new();

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    cancel.cancel();

    if let Err(e) = server_handle.await {
        tracing::error!("Server task failed: {}", e);
    }

    if let Err(e) = store.shutdown().await {
        tracing::error!("Failed to shutdown store: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
