//! Process wiring for the `telemetry-worker` binary
//!
//! Builds the tokio runtime, opens the SQLite store and Redis queue named by
//! the config, and turns SIGINT/SIGTERM into the start of a graceful shutdown.

use crate::clock::SystemClock;
use crate::config::{Config, ConfigSource, load_config_with_fallback};
use crate::lease::StoreLease;
use crate::queue::RedisQueue;
use crate::store::SqliteStore;
use crate::types::ThreadCount;
use crate::worker::TelemetryWorker;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::info;

/// Runtime for `threads` workers; one (the default) means current-thread
///
/// The jobs spend their time awaiting Redis and SQLite, so one thread is
/// usually enough.
///
/// # Errors
/// Returns error if the runtime cannot be created
pub fn build_runtime(threads: Option<ThreadCount>) -> Result<Runtime> {
    let threads = threads.unwrap_or_default().get();
    let runtime = if threads == 1 {
        Builder::new_current_thread().enable_all().build()?
    } else {
        Builder::new_multi_thread()
            .worker_threads(threads)
            .enable_all()
            .build()?
    };
    info!("Tokio runtime ready ({} worker thread(s))", threads);
    Ok(runtime)
}

/// Resolves on the first Ctrl+C or (on Unix) SIGTERM
///
/// A signal whose handler cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
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
}

/// Load configuration and log where it came from
///
/// # Errors
/// Returns error if configuration loading fails
pub fn load_and_log_config(config_path: impl AsRef<Path>) -> Result<(Config, ConfigSource)> {
    let (config, source) = load_config_with_fallback(config_path)?;

    info!("Loaded configuration from {}", source.description());
    info!(
        "Draining '{}' and '{}' into {}",
        config.queue.logs_list,
        config.queue.metrics_list,
        config.storage.path.display()
    );
    info!(
        "Retention {:?}, batch sizes {}/{}",
        config.worker.retention, config.worker.log_batch_size, config.worker.metric_batch_size
    );

    Ok((config, source))
}

/// Connect the Redis queue and open the SQLite store named by `config`
///
/// # Errors
/// Returns error if the database cannot be opened or Redis is unreachable
pub async fn build_worker(config: Config) -> Result<TelemetryWorker> {
    let store = Arc::new(SqliteStore::open(&config.storage.path).with_context(|| {
        format!(
            "Failed to open database '{}'",
            config.storage.path.display()
        )
    })?);
    let queue = Arc::new(
        RedisQueue::connect(&config.queue.url)
            .await
            .context("Failed to connect to the fast queue")?,
    );

    let lease_config = config.lease.clone();
    let mut builder = TelemetryWorker::builder_with_store(config, store.clone(), queue);
    if lease_config.enabled {
        let holder = lease_config.holder_id();
        info!("Job leases enabled (holder {})", holder);
        builder = builder.with_lease(Arc::new(StoreLease::new(
            store,
            holder,
            lease_config.ttl,
            Arc::new(SystemClock),
        )));
    }

    Ok(builder.build())
}
