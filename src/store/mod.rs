//! Durable storage
//!
//! The jobs only see these traits. Two engines implement all of them:
//! [`MemoryStore`] for tests and embedding, [`SqliteStore`] for the binary.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::types::{AggregatedMetric, InsertReport, MetricGroup, RawLogEntry, RawMetric, Window};
use async_trait::async_trait;

/// Raw per-request metrics
#[async_trait]
pub trait RawMetricStore: Send + Sync + std::fmt::Debug {
    /// Bulk insert raw metrics
    async fn insert_metrics(&self, metrics: &[RawMetric]) -> Result<InsertReport, StoreError>;

    /// Group the metrics inside `window` by `(service, path)`
    ///
    /// Each group carries its count, error count (status >= 400), latency
    /// total and every individual latency.
    async fn group_window(&self, window: Window) -> Result<Vec<MetricGroup>, StoreError>;

    /// Delete every metric with `timestamp < cutoff_ms`; returns the number deleted
    async fn delete_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError>;
}

/// Sink for opaque log documents
#[async_trait]
pub trait LogStore: Send + Sync + std::fmt::Debug {
    /// Insert log documents verbatim
    async fn insert_logs(&self, logs: &[RawLogEntry]) -> Result<InsertReport, StoreError>;
}

/// Per-minute rollups
#[async_trait]
pub trait RollupStore: Send + Sync + std::fmt::Debug {
    /// Unordered bulk insert
    ///
    /// A document the store rejects is counted in `failed` and does not stop
    /// the rest of the batch.
    async fn insert_rollups(
        &self,
        rollups: &[AggregatedMetric],
    ) -> Result<InsertReport, StoreError>;
}

/// TTL'd lock records keyed by name, shared between worker replicas
#[async_trait]
pub trait LeaseStore: Send + Sync + std::fmt::Debug {
    /// Take or renew the lease `name` for `holder` until `expires_at_ms`
    ///
    /// Succeeds when the lease is free, expired at `now_ms`, or already held by
    /// `holder`.
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now_ms: i64,
        expires_at_ms: i64,
    ) -> Result<bool, StoreError>;

    /// Drop the lease if `holder` still owns it
    async fn release_lease(&self, name: &str, holder: &str) -> Result<(), StoreError>;
}
