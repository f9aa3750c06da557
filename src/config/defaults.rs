//! Default values for configuration fields
//!
//! This module centralizes all default value functions used in serde deserialization.

use crate::constants::{aggregation, drain, lifecycle, retention};
use crate::types::{BatchSize, ChunkSize};
use std::path::PathBuf;
use std::time::Duration;

/// Default log entries popped per drain tick
#[inline]
pub fn log_batch_size() -> BatchSize {
    BatchSize::new(drain::LOG_BATCH_SIZE).unwrap_or(BatchSize::DEFAULT)
}

/// Default metric entries popped per drain tick
#[inline]
pub fn metric_batch_size() -> BatchSize {
    BatchSize::new(drain::METRIC_BATCH_SIZE).unwrap_or(BatchSize::DEFAULT)
}

/// Default documents per bulk insert
#[inline]
pub fn insert_chunk_size() -> ChunkSize {
    ChunkSize::DEFAULT
}

/// Default number of documents built between yields
#[inline]
pub fn yield_every() -> ChunkSize {
    ChunkSize::YIELD_DEFAULT
}

#[inline]
pub fn drain_busy_delay() -> Duration {
    drain::BUSY_DELAY
}

#[inline]
pub fn drain_idle_delay() -> Duration {
    drain::IDLE_DELAY
}

#[inline]
pub fn drain_warmup() -> Duration {
    drain::WARMUP_DELAY
}

#[inline]
pub fn aggregation_jitter() -> Duration {
    aggregation::JITTER
}

#[inline]
pub fn cleanup_jitter() -> Duration {
    retention::JITTER
}

/// Default raw metric retention (24 hours)
#[inline]
pub fn retention() -> Duration {
    retention::RAW_METRICS
}

#[inline]
pub fn shutdown_timeout() -> Duration {
    lifecycle::SHUTDOWN_TIMEOUT
}

/// Default Redis endpoint
#[inline]
pub fn redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

#[inline]
pub fn logs_list() -> String {
    drain::LOGS_LIST.to_string()
}

#[inline]
pub fn metrics_list() -> String {
    drain::METRICS_LIST.to_string()
}

/// Default SQLite database file
#[inline]
pub fn database_path() -> PathBuf {
    PathBuf::from("telemetry.db")
}

/// Error rate (percent) above which a group raises an alert
#[inline]
pub fn alert_error_rate() -> f64 {
    50.0
}

/// Average latency (ms) above which a group raises an alert
#[inline]
pub fn alert_avg_latency_ms() -> f64 {
    2_000.0
}

/// Minimum samples in a batch before a group can alert
#[inline]
pub fn alert_min_samples() -> u64 {
    10
}

/// Quiet period between two alerts for the same `(service, path)`
#[inline]
pub fn alert_cooldown() -> Duration {
    Duration::from_secs(5 * 60)
}

#[inline]
pub fn lease_ttl() -> Duration {
    lifecycle::LEASE_TTL
}
