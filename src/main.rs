//! filecache - A TTL-aware file cache
//!
//! Runs a cache instance configured from the environment until shutdown,
//! letting the background sweep keep the store free of expired entries.

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filecache::{Config, FileCache};

/// Main entry point for the file cache service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the cache (validates config, loads stats, starts the sweep task)
/// 4. Wait for SIGINT/SIGTERM
/// 5. Close the cache, persisting stats
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filecache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting file cache");

    let config = Config::from_env();
    info!(
        data_dir = %config.data_dir.display(),
        max_cache_size = config.max_cache_size,
        default_ttl_secs = config.default_ttl.as_secs(),
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        compression = config.compression,
        "Configuration loaded"
    );

    let cache = FileCache::open(config)
        .await
        .context("failed to open file cache")?;

    let stats = cache.stats()?;
    info!(
        total_files = stats.total_files,
        total_size = stats.total_size,
        "Cache ready"
    );

    shutdown_signal().await?;

    let stats = cache.stats()?;
    info!(
        total_files = stats.total_files,
        hit_rate = stats.hit_rate,
        miss_rate = stats.miss_rate,
        "Shutting down"
    );
    cache.close().await.context("failed to close file cache")?;

    info!("File cache shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() -> anyhow::Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .context("failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<anyhow::Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("Received Ctrl+C, initiating shutdown...");
        }
        result = terminate => {
            result?;
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
    Ok(())
}
