//! The three background jobs and the helpers they share
//!
//! Each job module exposes `run` (one guarded execution, no rescheduling),
//! `tick` (run, then reschedule) and `schedule` (arm the next tick).

pub mod aggregation;
pub mod cleanup;
pub mod drain;

pub use aggregation::{AggregationReport, build_rollup, p95_latency};
pub use cleanup::CleanupReport;
pub use drain::{DrainReport, StreamReport};

use crate::error::StoreError;
use crate::lease::LeaseTerm;
use crate::types::{InsertReport, JobKind};
use crate::worker::WorkerContext;
use std::future::Future;
use tracing::{debug, warn};

/// Run `body` while holding the job's run flag and lease
///
/// Returns `None` without running `body` when another run of `job` is in
/// flight in this worker, when the lease is held elsewhere, or once the
/// worker has been stopped. The shutdown check comes after the run flag is
/// taken, so `shutdown()` either sees the flag or this run sees the stop.
pub(crate) async fn guarded<T, F, Fut>(
    ctx: &WorkerContext,
    job: JobKind,
    term: LeaseTerm,
    body: F,
) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let Some(_guard) = ctx.flags.try_enter(job) else {
        warn!("Previous {} run still in progress, skipping", job);
        ctx.stats.record_skipped_run();
        return None;
    };

    if ctx.timers.is_shutdown() {
        debug!("Worker stopped, not starting {}", job);
        return None;
    }

    if !ctx.lease.acquire(job, term).await {
        debug!("Lease for {} not acquired, skipping", job);
        ctx.stats.record_skipped_run();
        return None;
    }

    let output = body().await;
    if term.released_after_run() {
        ctx.lease.release(job).await;
    }
    Some(output)
}

/// A chunked insert that stopped at a failing chunk
#[derive(Debug)]
pub(crate) struct PartialInsert {
    /// What the earlier chunks wrote
    pub written: InsertReport,
    pub source: StoreError,
}

/// Insert `items` in chunks of `chunk_size`, yielding between chunks
///
/// Rows rejected inside a chunk are counted in the report; a chunk-level
/// error aborts the remaining chunks.
pub(crate) async fn insert_chunked<'a, T, F, Fut>(
    items: &'a [T],
    chunk_size: usize,
    mut insert: F,
) -> Result<InsertReport, PartialInsert>
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = Result<InsertReport, StoreError>>,
{
    let mut written = InsertReport::default();
    let mut chunks = items.chunks(chunk_size.max(1)).peekable();
    while let Some(chunk) = chunks.next() {
        match insert(chunk).await {
            Ok(report) => written = written.merge(report),
            Err(source) => return Err(PartialInsert { written, source }),
        }
        if chunks.peek().is_some() {
            tokio::task::yield_now().await;
        }
    }
    Ok(written)
}

/// Parse raw queue entries, dropping the ones `parse` rejects
///
/// Returns the parsed entries and the number discarded.
pub(crate) fn parse_entries<T>(
    list: &str,
    raw: Vec<String>,
    parse: impl Fn(&str) -> Option<T>,
) -> (Vec<T>, usize) {
    let mut parsed = Vec::with_capacity(raw.len());
    let mut discarded = 0;
    for entry in raw {
        match parse(&entry) {
            Some(value) => parsed.push(value),
            None => {
                discarded += 1;
                debug!(list, "Discarding malformed entry ({} bytes)", entry.len());
            }
        }
    }
    (parsed, discarded)
}
