//! HTTP server for the ferrite caching proxy.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod stream;

use std::sync::Arc;

use ferrite_cache::{HttpObjectFetcher, ObjectStoreCache};
use ferrite_core::config::ProxyConfig;
use ferrite_core::{MemoryBudget, Result};
use ferrite_qos::QosController;
use tracing::info;

use crate::state::AppState;

/// Assemble the application state from configuration.
pub fn build_state(config: &ProxyConfig) -> Result<AppState> {
    let fetcher = Arc::new(HttpObjectFetcher::new(config.remote.endpoint.clone()));
    let cache = Arc::new(ObjectStoreCache::new(&config.cache, fetcher)?);
    let qos = Arc::new(QosController::new(&config.qos));
    let budget = Arc::new(MemoryBudget::new(config.cache.max_stream_memory_bytes));
    Ok(AppState { cache, qos, budget })
}

/// Run the proxy until the process is stopped.
pub async fn run(config: ProxyConfig) -> Result<()> {
    let state = build_state(&config)?;
    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr).await?;
    info!(addr = %config.server.listen_addr, "ferrite proxy listening");
    axum::serve(listener, router)
        .await
        .map_err(ferrite_core::Error::Storage)?;
    Ok(())
}
