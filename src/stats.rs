//! Worker counters
//!
//! Lock-free monotonic counters updated by the jobs, plus the immutable
//! snapshot handed to whoever renders health output.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic counters for one worker
#[derive(Debug)]
pub struct WorkerStats {
    aggregation_runs: AtomicU64,
    rollups_inserted: AtomicU64,
    metrics_inserted: AtomicU64,
    logs_inserted: AtomicU64,
    cleanup_runs: AtomicU64,
    raw_metrics_deleted: AtomicU64,
    entries_discarded: AtomicU64,
    alert_failures: AtomicU64,
    skipped_runs: AtomicU64,
    start_time: Instant,
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            aggregation_runs: AtomicU64::new(0),
            rollups_inserted: AtomicU64::new(0),
            metrics_inserted: AtomicU64::new(0),
            logs_inserted: AtomicU64::new(0),
            cleanup_runs: AtomicU64::new(0),
            raw_metrics_deleted: AtomicU64::new(0),
            entries_discarded: AtomicU64::new(0),
            alert_failures: AtomicU64::new(0),
            skipped_runs: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_aggregation_run(&self, rollups: usize) {
        self.aggregation_runs.fetch_add(1, Ordering::Relaxed);
        self.rollups_inserted
            .fetch_add(rollups as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_metrics_inserted(&self, count: usize) {
        self.metrics_inserted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_logs_inserted(&self, count: usize) {
        self.logs_inserted.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cleanup_run(&self, deleted: u64) {
        self.cleanup_runs.fetch_add(1, Ordering::Relaxed);
        self.raw_metrics_deleted
            .fetch_add(deleted, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_discarded(&self, count: usize) {
        if count > 0 {
            self.entries_discarded
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_alert_failure(&self) {
        self.alert_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped_run(&self) {
        self.skipped_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Take an immutable snapshot of every counter
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            aggregation_runs: self.aggregation_runs.load(Ordering::Relaxed),
            rollups_inserted: self.rollups_inserted.load(Ordering::Relaxed),
            metrics_inserted: self.metrics_inserted.load(Ordering::Relaxed),
            logs_inserted: self.logs_inserted.load(Ordering::Relaxed),
            cleanup_runs: self.cleanup_runs.load(Ordering::Relaxed),
            raw_metrics_deleted: self.raw_metrics_deleted.load(Ordering::Relaxed),
            entries_discarded: self.entries_discarded.load(Ordering::Relaxed),
            alert_failures: self.alert_failures.load(Ordering::Relaxed),
            skipped_runs: self.skipped_runs.load(Ordering::Relaxed),
            uptime: self.start_time.elapsed(),
        }
    }
}

/// Point-in-time copy of the worker counters
///
/// Serializes with camelCase keys so a host health endpoint can return it
/// as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub aggregation_runs: u64,
    pub rollups_inserted: u64,
    pub metrics_inserted: u64,
    pub logs_inserted: u64,
    pub cleanup_runs: u64,
    pub raw_metrics_deleted: u64,
    pub entries_discarded: u64,
    pub alert_failures: u64,
    pub skipped_runs: u64,
    #[serde(rename = "uptimeSecs", serialize_with = "serialize_secs")]
    pub uptime: Duration,
}

fn serialize_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

impl StatsSnapshot {
    /// Format uptime as a human-readable string
    #[must_use]
    pub fn format_uptime(&self) -> String {
        let secs = self.uptime.as_secs();
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
