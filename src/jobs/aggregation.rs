//! Per-minute metric rollups
//!
//! Once a minute, shortly after the boundary, the previous full minute of
//! raw metrics is grouped by `(service, path)` and one [`AggregatedMetric`]
//! per group is written to the rollup store.

use super::{PartialInsert, guarded, insert_chunked};
use crate::constants::aggregation::{PERCENTILE, WINDOW_LABEL};
use crate::constants::clock::MINUTE_MS;
use crate::error::WorkerError;
use crate::lease::LeaseTerm;
use crate::types::{AggregatedMetric, InsertReport, JobKind, MetricGroup, Window};
use crate::worker::WorkerContext;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Outcome of one aggregation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationReport {
    pub window: Window,
    /// Number of `(service, path)` groups found in the window
    pub groups: usize,
    pub written: InsertReport,
}

/// 95th percentile of `latencies`, by nearest rank
///
/// Sorts in place. Returns `0.0` for an empty slice.
///
/// ```
/// use telemetry_worker::jobs::p95_latency;
///
/// assert_eq!(p95_latency(&mut [10.0, 30.0]), 30.0);
/// assert_eq!(p95_latency(&mut []), 0.0);
/// ```
pub fn p95_latency(latencies: &mut [f64]) -> f64 {
    if latencies.is_empty() {
        return 0.0;
    }
    latencies.sort_by(f64::total_cmp);
    let index = ((latencies.len() as f64 * PERCENTILE).floor() as usize).min(latencies.len() - 1);
    latencies[index]
}

/// Summarize one group into its rollup row
pub fn build_rollup(window: Window, mut group: MetricGroup) -> AggregatedMetric {
    let count = group.count.max(1) as f64;
    AggregatedMetric {
        window_start: window.start_ms,
        window_end: window.end_ms,
        window_size: WINDOW_LABEL.to_string(),
        avg_latency_ms: group.total_latency_ms / count,
        p95_latency_ms: p95_latency(&mut group.latencies),
        error_rate: group.error_count as f64 / count * 100.0,
        count: group.count,
        error_count: group.error_count,
        service: group.service,
        path: group.path,
    }
}

/// Aggregate the previous minute once, without rescheduling
///
/// `Ok(None)` means the run was skipped because another one holds the job.
pub(crate) async fn run(
    ctx: &Arc<WorkerContext>,
) -> Result<Option<AggregationReport>, WorkerError> {
    let window = Window::previous_minute(ctx.clock.now_millis());
    // One replica per window: the lease lives until the next window closes
    let term = LeaseTerm::Period {
        until_ms: window.end_ms + MINUTE_MS,
    };
    guarded(ctx, JobKind::Aggregation, term, || aggregate(ctx, window))
        .await
        .transpose()
}

async fn aggregate(
    ctx: &WorkerContext,
    window: Window,
) -> Result<AggregationReport, WorkerError> {
    let started = Instant::now();

    let groups = ctx.raw_metrics.group_window(window).await?;
    if groups.is_empty() {
        debug!(
            "No raw metrics in window [{}, {})",
            window.start_ms, window.end_ms
        );
        ctx.stats.record_aggregation_run(0);
        return Ok(AggregationReport {
            window,
            groups: 0,
            written: InsertReport::default(),
        });
    }

    let group_count = groups.len();
    let yield_every = ctx.settings.yield_every.get();
    let mut rollups = Vec::with_capacity(group_count);
    for group in groups {
        rollups.push(build_rollup(window, group));
        if rollups.len().is_multiple_of(yield_every) {
            tokio::task::yield_now().await;
        }
    }

    let written = match insert_chunked(
        &rollups,
        ctx.settings.insert_chunk_size.get(),
        |chunk| ctx.rollups.insert_rollups(chunk),
    )
    .await
    {
        Ok(written) => written,
        Err(PartialInsert { written, source }) => {
            ctx.stats.record_aggregation_run(written.inserted);
            return Err(source.into());
        }
    };

    ctx.stats.record_aggregation_run(written.inserted);
    info!(
        groups = group_count,
        inserted = written.inserted,
        failed = written.failed,
        "Aggregated window [{}, {}) in {:?}",
        window.start_ms,
        window.end_ms,
        started.elapsed()
    );

    Ok(AggregationReport {
        window,
        groups: group_count,
        written,
    })
}

/// Run once, then arm the next minute's run
pub(crate) async fn tick(ctx: Arc<WorkerContext>) {
    if let Err(e) = run(&ctx).await {
        error!("Aggregation run failed: {}", e);
    }
    schedule(&ctx);
}

/// Arm the next run at the next minute boundary plus jitter
pub(crate) fn schedule(ctx: &Arc<WorkerContext>) {
    let delay = ctx
        .timers
        .delay_to_next_minute(ctx.settings.aggregation_jitter);
    if ctx
        .timers
        .schedule_after(delay, tick(Arc::clone(ctx)))
        .is_some()
    {
        debug!("Next aggregation in {:?}", delay);
    }
}
