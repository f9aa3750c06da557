//! Tests for the queue drain job

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use telemetry_worker::{
    Config, FastQueue, ManualClock, MemoryQueue, MemoryStore, SharedDependencies, TelemetryWorker,
};

mod test_helpers;
use test_helpers::*;

const LOGS: &str = "telemetry:logs";
const METRICS: &str = "telemetry:metrics";

#[tokio::test]
async fn test_full_log_batch_is_busy() -> Result<()> {
    let h = harness(T0);
    h.queue.extend(LOGS, (0..150).map(log_entry));

    let report = h.worker.run_drain_now().await.expect("not skipped");
    assert_eq!(report.logs.popped, 100);
    assert_eq!(report.logs.inserted, 100);
    assert!(report.logs.hit_cap);
    assert!(report.is_busy());
    assert_eq!(h.queue.len(LOGS), 50);

    // The remainder does not fill a batch
    let report = h.worker.run_drain_now().await.expect("not skipped");
    assert_eq!(report.logs.inserted, 50);
    assert!(!report.is_busy());

    assert_eq!(h.store.logs().len(), 150);
    assert_eq!(h.worker.stats().logs_inserted, 150);
    Ok(())
}

#[tokio::test]
async fn test_empty_queue_is_idle() {
    let h = harness(T0);
    let report = h.worker.run_drain_now().await.expect("not skipped");
    assert_eq!(report.logs.popped, 0);
    assert_eq!(report.metrics.popped, 0);
    assert!(!report.is_busy());
}

#[tokio::test]
async fn test_metrics_are_drained_and_stamped() -> Result<()> {
    let h = harness(T0 + 42);
    h.queue.extend(
        METRICS,
        [
            metric_entry("api", "/a", 200, 12.5, Some(T0 - 5)),
            metric_entry("api", "/b", 503, 80.0, None),
        ],
    );

    let report = h.worker.run_drain_now().await.expect("not skipped");
    assert_eq!(report.metrics.inserted, 2);

    let stored = h.store.raw_metrics();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].timestamp, T0 - 5);
    assert_eq!(stored[1].timestamp, T0 + 42);
    assert_eq!(stored[1].status_code, 503);
    assert_eq!(h.worker.stats().metrics_inserted, 2);
    Ok(())
}

#[tokio::test]
async fn test_malformed_entries_are_dropped_individually() -> Result<()> {
    let h = harness(T0);
    h.queue.extend(
        METRICS,
        [
            metric_entry("api", "/ok", 200, 1.0, Some(T0)),
            "{not json".to_string(),
            r#"{"service":"api"}"#.to_string(),
            metric_entry("", "/blank-service", 200, 1.0, Some(T0)),
            metric_entry("api", "/ok2", 200, 2.0, Some(T0)),
        ],
    );
    h.queue.extend(LOGS, ["plain text".to_string(), log_entry(1)]);

    let report = h.worker.run_drain_now().await.expect("not skipped");
    assert_eq!(report.metrics.popped, 5);
    assert_eq!(report.metrics.inserted, 2);
    assert_eq!(report.metrics.discarded, 3);
    assert_eq!(report.logs.inserted, 1);
    assert_eq!(report.logs.discarded, 1);

    assert_eq!(h.worker.stats().entries_discarded, 4);
    assert_eq!(h.store.raw_metrics().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failing_alert_check_does_not_affect_ingestion() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let alert = Arc::new(FailingAlertCheck::default());
    let worker = TelemetryWorker::builder_with_store(Config::default(), store.clone(), queue.clone())
        .with_clock(Arc::new(ManualClock::new(T0)))
        .with_alert_check(alert.clone())
        .build();

    queue.extend(METRICS, (0..10).map(|i| metric_entry("api", "/x", 500, i as f64, None)));
    let report = worker.run_drain_now().await.expect("not skipped");
    assert_eq!(report.metrics.inserted, 10);
    assert!(!report.metrics.failed);

    // Let the detached alert task finish
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(alert.calls.load(Ordering::SeqCst), 1);

    let stats = worker.stats();
    assert_eq!(stats.metrics_inserted, 10);
    assert_eq!(stats.alert_failures, 1);
    assert_eq!(store.raw_metrics().len(), 10);
    Ok(())
}

#[tokio::test]
async fn test_alert_check_not_called_without_metrics() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let alert = Arc::new(FailingAlertCheck::default());
    let worker = TelemetryWorker::builder_with_store(Config::default(), store, queue.clone())
        .with_alert_check(alert.clone())
        .build();

    queue.extend(LOGS, [log_entry(1)]);
    worker.run_drain_now().await.expect("not skipped");
    tokio::task::yield_now().await;
    assert_eq!(alert.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_log_sink_failure_does_not_stop_metrics() -> Result<()> {
    let metric_store = Arc::new(MemoryStore::new());
    let log_sink = MemoryStore::new();
    log_sink.set_unavailable(true);
    let queue = Arc::new(MemoryQueue::new());
    let deps = SharedDependencies::resolved(queue.clone(), Arc::new(log_sink));
    let worker = TelemetryWorker::builder(Config::default(), metric_store.clone(), metric_store.clone(), deps)
        .with_clock(Arc::new(ManualClock::new(T0)))
        .build();

    queue.extend(LOGS, [log_entry(1), log_entry(2)]);
    queue.extend(METRICS, [metric_entry("api", "/a", 200, 3.0, None)]);

    let report = worker.run_drain_now().await.expect("not skipped");
    assert!(report.logs.failed);
    assert_eq!(report.logs.inserted, 0);
    assert!(!report.metrics.failed);
    assert_eq!(report.metrics.inserted, 1);
    assert_eq!(metric_store.raw_metrics().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_queue_outage_marks_both_streams_failed() -> Result<()> {
    let h = harness(T0);
    h.queue.set_unavailable(true);

    let report = h.worker.run_drain_now().await.expect("not skipped");
    assert!(report.logs.failed);
    assert!(report.metrics.failed);
    assert!(!report.is_busy());

    h.queue.set_unavailable(false);
    h.queue.push(LOGS, log_entry(7)).await?;
    let report = h.worker.run_drain_now().await.expect("not skipped");
    assert_eq!(report.logs.inserted, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_drain_follows_backpressure() -> Result<()> {
    let mut config = Config::default();
    config.worker.drain_warmup = Duration::from_millis(100);
    let h = harness_with(config, T0);
    h.queue.extend(LOGS, (0..250).map(log_entry));

    h.worker.start().await?;

    // Warm-up, then busy ticks 10ms apart drain the backlog
    tokio::time::sleep(Duration::from_millis(105)).await;
    assert_eq!(h.store.logs().len(), 100);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.store.logs().len(), 200);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.store.logs().len(), 250);

    // The last tick was not full, so the next one waits for the idle delay
    h.queue.extend(LOGS, (0..5).map(log_entry));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.store.logs().len(), 250);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.store.logs().len(), 255);

    h.worker.stop();
    Ok(())
}
