//! Resilient Cache - admin server
//!
//! Runs the cache-aside layer behind a small HTTP surface for inspection
//! and administration.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resilient_cache::api::create_router;
use resilient_cache::cache::Backend;
use resilient_cache::{spawn_cleanup_task, AppState, Config, ResilientCache};

/// Main entry point for the cache admin server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build the store backend and attempt the initial connection
/// 4. Start the expiry sweep when the store is in-process
/// 5. Serve the admin router on the configured port
/// 6. On SIGINT/SIGTERM, stop serving and close the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resilient_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resilient Cache");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        backend = ?config.backend,
        default_ttl = config.default_ttl,
        port = config.server_port,
        single_flight = config.single_flight,
        "Configuration loaded"
    );

    let backend = Backend::from_config(&config).context("failed to build cache backend")?;

    let cleanup_handle = backend
        .as_memory()
        .map(|store| spawn_cleanup_task(store.clone(), config.cleanup_interval));
    if cleanup_handle.is_some() {
        info!("Background expiry sweep started");
    }

    // Never fails: an unreachable store only disables caching
    let cache = Arc::new(ResilientCache::connect(backend, &config).await);
    info!(state = %cache.health(), "Cache initialized");

    let state = AppState {
        cache: Arc::clone(&cache),
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Expiry sweep aborted");
    }
    cache.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
