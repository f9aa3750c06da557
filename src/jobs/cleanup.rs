//! Raw metric retention

use super::guarded;
use crate::constants::clock::HOUR_MS;
use crate::error::WorkerError;
use crate::lease::LeaseTerm;
use crate::timer::next_boundary;
use crate::types::JobKind;
use crate::worker::WorkerContext;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of one cleanup run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    /// Rows with `timestamp < cutoff_ms` were deleted
    pub cutoff_ms: i64,
    pub deleted: u64,
}

/// Delete expired raw metrics once, without rescheduling
pub(crate) async fn run(ctx: &Arc<WorkerContext>) -> Result<Option<CleanupReport>, WorkerError> {
    let term = LeaseTerm::Period {
        until_ms: next_boundary(ctx.clock.now_millis(), HOUR_MS),
    };
    guarded(ctx, JobKind::Cleanup, term, || cleanup(ctx))
        .await
        .transpose()
}

async fn cleanup(ctx: &WorkerContext) -> Result<CleanupReport, WorkerError> {
    let retention_ms = i64::try_from(ctx.settings.retention.as_millis()).unwrap_or(i64::MAX);
    let cutoff_ms = ctx.clock.now_millis().saturating_sub(retention_ms);

    let deleted = ctx.raw_metrics.delete_older_than(cutoff_ms).await?;
    ctx.stats.record_cleanup_run(deleted);

    if deleted > 0 {
        info!("Deleted {} raw metric(s) older than {}", deleted, cutoff_ms);
    } else {
        debug!("No raw metrics older than {}", cutoff_ms);
    }
    Ok(CleanupReport { cutoff_ms, deleted })
}

/// Run once, then arm the next hour's run
pub(crate) async fn tick(ctx: Arc<WorkerContext>) {
    if let Err(e) = run(&ctx).await {
        error!("Cleanup run failed: {}", e);
    }
    schedule(&ctx);
}

/// Arm the next run at the next hour boundary plus jitter
pub(crate) fn schedule(ctx: &Arc<WorkerContext>) {
    let delay = ctx.timers.delay_to_next_hour(ctx.settings.cleanup_jitter);
    if ctx
        .timers
        .schedule_after(delay, tick(Arc::clone(ctx)))
        .is_some()
    {
        debug!("Next cleanup in {:?}", delay);
    }
}
