//! Tests for raw metric retention

use anyhow::Result;
use std::time::Duration;
use telemetry_worker::{Config, RawMetricStore};

mod test_helpers;
use test_helpers::*;

const DAY_MS: i64 = 24 * HOUR_MS;

#[tokio::test]
async fn test_deletes_strictly_older_than_retention() -> Result<()> {
    let now = T0 + 2 * DAY_MS;
    let h = harness(now);
    let cutoff = now - DAY_MS;
    h.store
        .insert_metrics(&[
            raw_metric(cutoff - 10_000, "api", "/old", 200, 1.0),
            raw_metric(cutoff - 1, "api", "/old", 200, 1.0),
            raw_metric(cutoff, "api", "/edge", 200, 1.0),
            raw_metric(now - 1_000, "api", "/fresh", 200, 1.0),
        ])
        .await?;

    let report = h.worker.run_cleanup_now().await?.expect("not skipped");
    assert_eq!(report.cutoff_ms, cutoff);
    assert_eq!(report.deleted, 2);

    let remaining: Vec<String> = h.store.raw_metrics().into_iter().map(|m| m.path).collect();
    assert_eq!(remaining, vec!["/edge".to_string(), "/fresh".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_second_run_deletes_nothing() -> Result<()> {
    let now = T0 + 2 * DAY_MS;
    let h = harness(now);
    h.store
        .insert_metrics(&[raw_metric(T0, "api", "/old", 200, 1.0)])
        .await?;

    assert_eq!(h.worker.run_cleanup_now().await?.map(|r| r.deleted), Some(1));
    assert_eq!(h.worker.run_cleanup_now().await?.map(|r| r.deleted), Some(0));

    let stats = h.worker.stats();
    assert_eq!(stats.cleanup_runs, 2);
    assert_eq!(stats.raw_metrics_deleted, 1);
    Ok(())
}

#[tokio::test]
async fn test_custom_retention() -> Result<()> {
    let mut config = Config::default();
    config.worker.retention = Duration::from_secs(3600);
    let now = T0 + DAY_MS;
    let h = harness_with(config, now);
    h.store
        .insert_metrics(&[
            raw_metric(now - 2 * HOUR_MS, "api", "/a", 200, 1.0),
            raw_metric(now - 30 * MINUTE_MS, "api", "/b", 200, 1.0),
        ])
        .await?;

    let report = h.worker.run_cleanup_now().await?.expect("not skipped");
    assert_eq!(report.deleted, 1);
    assert_eq!(h.store.raw_metrics().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_store_failure_is_reported() {
    let h = harness(T0);
    h.store.set_unavailable(true);
    assert!(h.worker.run_cleanup_now().await.is_err());
    assert_eq!(h.worker.stats().cleanup_runs, 0);
}
