//! End-to-end: queue -> SQLite raw storage -> rollups -> retention

use anyhow::Result;
use std::sync::Arc;
use telemetry_worker::{Config, ManualClock, MemoryQueue, SqliteStore, TelemetryWorker};

mod test_helpers;
use test_helpers::*;

#[tokio::test]
async fn test_full_pipeline_on_sqlite_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(SqliteStore::open(dir.path().join("telemetry.db"))?);
    let queue = Arc::new(MemoryQueue::new());
    let clock = Arc::new(ManualClock::new(T0 + 10_000));
    let worker = TelemetryWorker::builder_with_store(Config::default(), store.clone(), queue.clone())
        .with_clock(clock.clone())
        .build();

    queue.extend(
        "telemetry:metrics",
        [
            metric_entry("api", "/lessons", 200, 10.0, None),
            metric_entry("api", "/lessons", 500, 30.0, None),
            metric_entry("media", "/upload", 201, 250.0, None),
        ],
    );
    queue.extend("telemetry:logs", (0..3).map(log_entry));

    let drained = worker.run_drain_now().await.expect("not skipped");
    assert_eq!(drained.metrics.inserted, 3);
    assert_eq!(drained.logs.inserted, 3);
    assert_eq!(store.log_count().await?, 3);

    // Next minute: aggregate the minute the metrics were stamped in
    clock.set(T0 + MINUTE_MS + 5_000);
    let aggregated = worker.run_aggregation_now().await?.expect("not skipped");
    assert_eq!(aggregated.groups, 2);
    assert_eq!(aggregated.written.inserted, 2);
    assert_eq!(store.rollup_count().await?, 2);

    // A day later the raw rows age out
    clock.set(T0 + 25 * HOUR_MS);
    let cleaned = worker.run_cleanup_now().await?.expect("not skipped");
    assert_eq!(cleaned.deleted, 3);
    assert_eq!(worker.run_cleanup_now().await?.map(|r| r.deleted), Some(0));

    // Rollups and logs are not subject to retention
    assert_eq!(store.rollup_count().await?, 2);
    assert_eq!(store.log_count().await?, 3);

    let stats = worker.stats();
    assert_eq!(stats.metrics_inserted, 3);
    assert_eq!(stats.logs_inserted, 3);
    assert_eq!(stats.rollups_inserted, 2);
    assert_eq!(stats.raw_metrics_deleted, 3);
    Ok(())
}
