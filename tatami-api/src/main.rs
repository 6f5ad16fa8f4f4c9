//! TATAMI API Server Entry Point
//!
//! Loads configuration, connects the Redis store pool and starts the Axum
//! HTTP server.

use std::sync::Arc;

use axum::Router;
use tatami_api::telemetry::{init_tracing, TelemetryConfig};
use tatami_api::{create_router, ApiConfig, ApiError, ApiResult, AppState, UpstreamClient};
use tatami_core::TatamiConfig;
use tatami_storage::{KeyValueStore, RedisStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let cache_config = TatamiConfig::from_env();
    cache_config.validate()?;
    let api_config = ApiConfig::from_env()?;

    let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::from_config(&cache_config.store)?);
    let source = Arc::new(UpstreamClient::from_config(&api_config.upstream)?);
    let state = AppState::new(store, source, cache_config.refresh.clone());

    tracing::info!(
        staleness_secs = cache_config.refresh.staleness.max_age.as_secs(),
        lock_ttl_secs = cache_config.refresh.lock_ttl.as_secs(),
        pool_size = cache_config.store.pool_size,
        upstream = %api_config.upstream.url_template,
        "Cache configured"
    );

    let app: Router = create_router(state, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting TATAMI API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler, run until killed.
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
