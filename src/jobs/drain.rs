//! Fast queue to durable storage
//!
//! Every tick pops a bounded batch from the logs list and from the metrics
//! list, parses each entry, and bulk-inserts the survivors. When either list
//! filled its batch the next tick follows almost immediately; otherwise the
//! job backs off to the idle cadence.

use super::{PartialInsert, guarded, insert_chunked, parse_entries};
use crate::deps::Dependencies;
use crate::lease::LeaseTerm;
use crate::types::{JobKind, QueuedMetric, RawLogEntry, RawMetric};
use crate::worker::WorkerContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What happened to one list during a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub popped: usize,
    pub inserted: usize,
    /// Entries that failed to parse
    pub discarded: usize,
    /// Rows the store rejected individually
    pub rejected: usize,
    /// The pop or an insert chunk failed
    pub failed: bool,
    /// `inserted` reached the batch size
    pub hit_cap: bool,
}

/// Outcome of one drain tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub logs: StreamReport,
    pub metrics: StreamReport,
}

impl DrainReport {
    /// Whether the next tick should follow at the busy cadence
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.logs.hit_cap || self.metrics.hit_cap
    }
}

/// Drain both lists once, without rescheduling
///
/// `None` means the tick was skipped. Store and queue failures are logged
/// per stream and reported through [`StreamReport::failed`].
pub(crate) async fn run(ctx: &Arc<WorkerContext>) -> Option<DrainReport> {
    guarded(ctx, JobKind::Drain, LeaseTerm::Run, || drain(ctx)).await
}

async fn drain(ctx: &Arc<WorkerContext>) -> DrainReport {
    let deps = match ctx.deps.get().await {
        Ok(deps) => deps,
        Err(e) => {
            warn!("Drain dependencies unavailable: {}", e);
            return DrainReport {
                logs: StreamReport {
                    failed: true,
                    ..Default::default()
                },
                metrics: StreamReport {
                    failed: true,
                    ..Default::default()
                },
            };
        }
    };

    let logs = drain_logs(ctx, &deps).await;
    let metrics = drain_metrics(ctx, &deps).await;
    let report = DrainReport { logs, metrics };

    if logs.inserted > 0 || metrics.inserted > 0 {
        info!(
            logs = logs.inserted,
            metrics = metrics.inserted,
            discarded = logs.discarded + metrics.discarded,
            busy = report.is_busy(),
            "Drained queue"
        );
    }
    report
}

async fn drain_logs(ctx: &WorkerContext, deps: &Dependencies) -> StreamReport {
    let list = ctx.queue.logs_list.as_str();
    let batch = ctx.settings.log_batch_size.get();

    let raw = match deps.queue.pop_batch(list, batch).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(list, "Failed to pop log entries: {}", e);
            return StreamReport {
                failed: true,
                ..Default::default()
            };
        }
    };

    let popped = raw.len();
    let (entries, discarded) = parse_entries(list, raw, RawLogEntry::parse);
    ctx.stats.record_discarded(discarded);

    let (written, failed) = match insert_chunked(
        &entries,
        ctx.settings.insert_chunk_size.get(),
        |chunk| deps.log_sink.insert_logs(chunk),
    )
    .await
    {
        Ok(written) => (written, false),
        Err(PartialInsert { written, source }) => {
            error!(list, "Failed to insert logs: {}", source);
            (written, true)
        }
    };
    ctx.stats.record_logs_inserted(written.inserted);

    StreamReport {
        popped,
        inserted: written.inserted,
        discarded,
        rejected: written.failed,
        failed,
        hit_cap: written.inserted >= batch,
    }
}

async fn drain_metrics(ctx: &Arc<WorkerContext>, deps: &Dependencies) -> StreamReport {
    let list = ctx.queue.metrics_list.as_str();
    let batch = ctx.settings.metric_batch_size.get();

    let raw = match deps.queue.pop_batch(list, batch).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(list, "Failed to pop metric entries: {}", e);
            return StreamReport {
                failed: true,
                ..Default::default()
            };
        }
    };

    let popped = raw.len();
    let now = ctx.clock.now_millis();
    let (metrics, discarded) = parse_entries(list, raw, |entry| {
        QueuedMetric::parse(entry).map(|metric| metric.into_raw(now))
    });
    ctx.stats.record_discarded(discarded);

    let (written, failed) = match insert_chunked(
        &metrics,
        ctx.settings.insert_chunk_size.get(),
        |chunk| ctx.raw_metrics.insert_metrics(chunk),
    )
    .await
    {
        Ok(written) => (written, false),
        Err(PartialInsert { written, source }) => {
            error!(list, "Failed to insert metrics: {}", source);
            (written, true)
        }
    };
    ctx.stats.record_metrics_inserted(written.inserted);

    if written.inserted > 0 {
        spawn_alert_check(ctx, deps, metrics);
    }

    StreamReport {
        popped,
        inserted: written.inserted,
        discarded,
        rejected: written.failed,
        failed,
        hit_cap: written.inserted >= batch,
    }
}

/// Hand the batch to the alert check on a detached task
fn spawn_alert_check(ctx: &Arc<WorkerContext>, deps: &Dependencies, batch: Vec<RawMetric>) {
    let alert = Arc::clone(&ctx.alert);
    let queue = Arc::clone(&deps.queue);
    let stats = Arc::clone(&ctx.stats);
    tokio::spawn(async move {
        if let Err(e) = alert.check(&batch, queue.as_ref()).await {
            warn!("Alert check failed: {}", e);
            stats.record_alert_failure();
        }
    });
}

/// Delay before the next tick
fn next_delay(ctx: &WorkerContext, report: Option<&DrainReport>) -> Duration {
    match report {
        Some(report) if report.is_busy() => ctx.settings.drain_busy_delay,
        _ => ctx.settings.drain_idle_delay,
    }
}

/// Run once, then arm the next tick at the busy or idle cadence
pub(crate) async fn tick(ctx: Arc<WorkerContext>) {
    let report = run(&ctx).await;
    let delay = next_delay(&ctx, report.as_ref());
    schedule(&ctx, delay);
}

/// Arm the next tick after `delay`
pub(crate) fn schedule(ctx: &Arc<WorkerContext>, delay: Duration) {
    if ctx
        .timers
        .schedule_after(delay, tick(Arc::clone(ctx)))
        .is_some()
    {
        debug!("Next drain in {:?}", delay);
    }
}
