//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use telemetry_worker::alert::{AlertCheck, AlertError};
use telemetry_worker::types::{InsertReport, MetricGroup, RawMetric, Window};
use telemetry_worker::{
    Config, FastQueue, ManualClock, MemoryQueue, MemoryStore, RawMetricStore, StoreError,
    TelemetryWorker,
};

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
/// An hour-aligned wall-clock time (2023-11-14 22:00:00 UTC)
pub const T0: i64 = 1_699_999_200_000;

pub fn raw_metric(timestamp: i64, service: &str, path: &str, status: u16, latency: f64) -> RawMetric {
    RawMetric {
        timestamp,
        service: service.to_string(),
        path: path.to_string(),
        status_code: status,
        latency_ms: latency,
    }
}

/// Serialized metric entry as producers push it
pub fn metric_entry(service: &str, path: &str, status: u16, latency: f64, timestamp: Option<i64>) -> String {
    let mut entry = serde_json::json!({
        "service": service,
        "path": path,
        "statusCode": status,
        "latencyMs": latency,
    });
    if let Some(ts) = timestamp {
        entry["timestamp"] = serde_json::json!(ts);
    }
    entry.to_string()
}

pub fn log_entry(n: usize) -> String {
    serde_json::json!({ "level": "info", "message": format!("request {}", n) }).to_string()
}

/// Worker over one in-memory store and queue, with a manual clock
pub struct Harness {
    pub worker: TelemetryWorker,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryQueue>,
    pub clock: Arc<ManualClock>,
}

pub fn harness_with(config: Config, now_ms: i64) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let clock = Arc::new(ManualClock::new(now_ms));
    let worker = TelemetryWorker::builder_with_store(config, store.clone(), queue.clone())
        .with_clock(clock.clone())
        .build();
    Harness {
        worker,
        store,
        queue,
        clock,
    }
}

pub fn harness(now_ms: i64) -> Harness {
    harness_with(Config::default(), now_ms)
}

/// Alert check that always fails, counting its calls
#[derive(Debug, Default)]
pub struct FailingAlertCheck {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AlertCheck for FailingAlertCheck {
    async fn check(&self, _batch: &[RawMetric], _queue: &dyn FastQueue) -> Result<(), AlertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AlertError::Other("alert backend down".to_string()))
    }
}

/// Raw metric store whose window query takes `delay`
#[derive(Debug)]
pub struct SlowMetricStore {
    pub inner: MemoryStore,
    pub delay: Duration,
    pub queries: AtomicUsize,
}

impl SlowMetricStore {
    pub fn new(inner: MemoryStore, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            queries: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RawMetricStore for SlowMetricStore {
    async fn insert_metrics(&self, metrics: &[RawMetric]) -> Result<InsertReport, StoreError> {
        self.inner.insert_metrics(metrics).await
    }

    async fn group_window(&self, window: Window) -> Result<Vec<MetricGroup>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.group_window(window).await
    }

    async fn delete_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        self.inner.delete_older_than(cutoff_ms).await
    }
}
