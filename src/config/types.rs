//! Configuration type definitions

use super::defaults;
use crate::types::{BatchSize, ChunkSize, duration_serde, millis_serde};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main worker configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    /// Job cadences, batch sizes and retention
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Fast queue connection and list names
    #[serde(default)]
    pub queue: QueueConfig,
    /// Durable storage location
    #[serde(default)]
    pub storage: StorageConfig,
    /// Alert check thresholds
    #[serde(default)]
    pub alert: AlertConfig,
    /// Cross-replica job leases
    #[serde(default)]
    pub lease: LeaseConfig,
}

/// Job tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Log entries popped per drain tick
    pub log_batch_size: BatchSize,
    /// Metric entries popped per drain tick
    pub metric_batch_size: BatchSize,
    /// Documents per bulk insert
    pub insert_chunk_size: ChunkSize,
    /// Rollups built between yields to the runtime
    pub yield_every: ChunkSize,
    /// Drain delay after a tick that hit a batch cap (milliseconds)
    #[serde(with = "millis_serde")]
    pub drain_busy_delay: Duration,
    /// Drain delay after a quiet tick (milliseconds)
    #[serde(with = "millis_serde")]
    pub drain_idle_delay: Duration,
    /// Delay before the first drain tick (milliseconds)
    #[serde(with = "millis_serde")]
    pub drain_warmup: Duration,
    /// Offset after each minute boundary before aggregating (seconds)
    #[serde(with = "duration_serde")]
    pub aggregation_jitter: Duration,
    /// Offset after each hour boundary before cleanup (seconds)
    #[serde(with = "duration_serde")]
    pub cleanup_jitter: Duration,
    /// Raw metric retention (seconds)
    #[serde(with = "duration_serde")]
    pub retention: Duration,
    /// How long shutdown waits for running jobs (seconds)
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            log_batch_size: defaults::log_batch_size(),
            metric_batch_size: defaults::metric_batch_size(),
            insert_chunk_size: defaults::insert_chunk_size(),
            yield_every: defaults::yield_every(),
            drain_busy_delay: defaults::drain_busy_delay(),
            drain_idle_delay: defaults::drain_idle_delay(),
            drain_warmup: defaults::drain_warmup(),
            aggregation_jitter: defaults::aggregation_jitter(),
            cleanup_jitter: defaults::cleanup_jitter(),
            retention: defaults::retention(),
            shutdown_timeout: defaults::shutdown_timeout(),
        }
    }
}

/// Fast queue settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Redis connection URL
    pub url: String,
    /// List holding serialized log entries
    pub logs_list: String,
    /// List holding serialized metric entries
    pub metrics_list: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: defaults::redis_url(),
            logs_list: defaults::logs_list(),
            metrics_list: defaults::metrics_list(),
        }
    }
}

/// Durable storage settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: defaults::database_path(),
        }
    }
}

/// Thresholds for the alert check run after each metric batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    /// Error rate in percent
    pub error_rate_threshold: f64,
    /// Average latency in milliseconds
    pub avg_latency_threshold_ms: f64,
    /// Groups with fewer samples in the batch never alert
    pub min_samples: u64,
    /// Quiet period per `(service, path)` (seconds)
    #[serde(with = "duration_serde")]
    pub cooldown: Duration,
    /// Queue list that receives alert events, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_list: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            error_rate_threshold: defaults::alert_error_rate(),
            avg_latency_threshold_ms: defaults::alert_avg_latency_ms(),
            min_samples: defaults::alert_min_samples(),
            cooldown: defaults::alert_cooldown(),
            alert_list: None,
        }
    }
}

/// Cross-replica lease settings
///
/// Leave disabled when exactly one worker runs per deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LeaseConfig {
    pub enabled: bool,
    /// Lease lifetime (seconds); must exceed the longest expected job run
    #[serde(with = "duration_serde")]
    pub ttl: Duration,
    /// Holder id; a random id is generated when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: defaults::lease_ttl(),
            holder: None,
        }
    }
}

impl LeaseConfig {
    /// Configured holder id, or a fresh random one
    #[must_use]
    pub fn holder_id(&self) -> String {
        self.holder
            .clone()
            .unwrap_or_else(|| format!("worker-{}", uuid::Uuid::new_v4()))
    }
}
