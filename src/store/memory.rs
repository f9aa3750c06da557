//! In-memory storage engine
//!
//! Implements every store trait on plain vectors behind mutexes. Used by the
//! test suite and by hosts that embed the worker without a database.
//! `set_unavailable(true)` makes every call fail, to exercise the jobs'
//! transient-failure paths.

use super::{LeaseStore, LogStore, RawMetricStore, RollupStore};
use crate::error::StoreError;
use crate::types::{AggregatedMetric, InsertReport, MetricGroup, RawLogEntry, RawMetric, Window};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    raw_metrics: Vec<RawMetric>,
    logs: Vec<RawLogEntry>,
    rollups: Vec<AggregatedMetric>,
    leases: HashMap<String, Lease>,
}

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    expires_at_ms: i64,
}

/// Shared in-memory store; clones see the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        // A panic while holding the lock cannot leave the vectors half-written
        Ok(self.tables.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        f(&tables)
    }

    /// Copy of every stored raw metric
    #[must_use]
    pub fn raw_metrics(&self) -> Vec<RawMetric> {
        self.read(|t| t.raw_metrics.clone())
    }

    /// Copy of every stored log document
    #[must_use]
    pub fn logs(&self) -> Vec<RawLogEntry> {
        self.read(|t| t.logs.clone())
    }

    /// Copy of every stored rollup
    #[must_use]
    pub fn rollups(&self) -> Vec<AggregatedMetric> {
        self.read(|t| t.rollups.clone())
    }

    /// Current holder of a lease, if unexpired at `now_ms`
    #[must_use]
    pub fn lease_holder(&self, name: &str, now_ms: i64) -> Option<String> {
        self.read(|t| {
            t.leases
                .get(name)
                .filter(|lease| lease.expires_at_ms > now_ms)
                .map(|lease| lease.holder.clone())
        })
    }
}

#[async_trait]
impl RawMetricStore for MemoryStore {
    async fn insert_metrics(&self, metrics: &[RawMetric]) -> Result<InsertReport, StoreError> {
        let mut tables = self.lock()?;
        tables.raw_metrics.extend_from_slice(metrics);
        Ok(InsertReport::all(metrics.len()))
    }

    async fn group_window(&self, window: Window) -> Result<Vec<MetricGroup>, StoreError> {
        let tables = self.lock()?;
        Ok(MetricGroup::group_in_window(&tables.raw_metrics, window))
    }

    async fn delete_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let mut tables = self.lock()?;
        let before = tables.raw_metrics.len();
        tables.raw_metrics.retain(|m| m.timestamp >= cutoff_ms);
        Ok((before - tables.raw_metrics.len()) as u64)
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert_logs(&self, logs: &[RawLogEntry]) -> Result<InsertReport, StoreError> {
        let mut tables = self.lock()?;
        tables.logs.extend_from_slice(logs);
        Ok(InsertReport::all(logs.len()))
    }
}

#[async_trait]
impl RollupStore for MemoryStore {
    async fn insert_rollups(
        &self,
        rollups: &[AggregatedMetric],
    ) -> Result<InsertReport, StoreError> {
        let mut tables = self.lock()?;
        let mut report = InsertReport::default();
        for rollup in rollups {
            if rollup.is_storable() {
                tables.rollups.push(rollup.clone());
                report.inserted += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now_ms: i64,
        expires_at_ms: i64,
    ) -> Result<bool, StoreError> {
        let mut tables = self.lock()?;
        let free = match tables.leases.get(name) {
            None => true,
            Some(lease) => lease.holder == holder || lease.expires_at_ms <= now_ms,
        };
        if free {
            tables.leases.insert(
                name.to_string(),
                Lease {
                    holder: holder.to_string(),
                    expires_at_ms,
                },
            );
        }
        Ok(free)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if tables
            .leases
            .get(name)
            .is_some_and(|lease| lease.holder == holder)
        {
            tables.leases.remove(name);
        }
        Ok(())
    }
}
