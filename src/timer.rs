//! Registry of pending delayed callbacks
//!
//! Every job schedules its next run through the registry, so a single
//! `cancel_all()` stops the whole worker. Each pending timer is a tokio task
//! sleeping until its deadline; the registry keeps its abort handle until it
//! fires or is cancelled.

use crate::clock::Clock;
use crate::constants::clock::{HOUR_MS, MINUTE_MS};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, info};

/// Handle of one scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Milliseconds until the next wall-clock minute boundary, plus `jitter`
///
/// Exactly on a boundary this returns a full minute, so a job never re-runs
/// the window it just finished.
///
/// ```
/// use std::time::Duration;
/// use telemetry_worker::timer::delay_to_next_minute;
///
/// let delay = delay_to_next_minute(59_000, Duration::from_secs(2));
/// assert_eq!(delay, Duration::from_secs(3));
/// ```
#[must_use]
pub fn delay_to_next_minute(now_ms: i64, jitter: Duration) -> Duration {
    delay_to_next_boundary(now_ms, MINUTE_MS, jitter)
}

/// Milliseconds until the next wall-clock hour boundary, plus `jitter`
#[must_use]
pub fn delay_to_next_hour(now_ms: i64, jitter: Duration) -> Duration {
    delay_to_next_boundary(now_ms, HOUR_MS, jitter)
}

/// First multiple of `period_ms` strictly after `now_ms`
#[must_use]
pub fn next_boundary(now_ms: i64, period_ms: i64) -> i64 {
    now_ms - now_ms.rem_euclid(period_ms) + period_ms
}

fn delay_to_next_boundary(now_ms: i64, period_ms: i64, jitter: Duration) -> Duration {
    let until_boundary = next_boundary(now_ms, period_ms) - now_ms;
    Duration::from_millis(until_boundary as u64) + jitter
}

/// Pending timers plus the worker-wide shutdown flag
#[derive(Debug)]
pub struct TimerRegistry {
    shutdown: AtomicBool,
    next_id: AtomicU64,
    pending: DashMap<TimerId, AbortHandle>,
    clock: Arc<dyn Clock>,
}

impl TimerRegistry {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            pending: DashMap::new(),
            clock,
        }
    }

    /// Run `task` after `delay`
    ///
    /// Returns `None` without scheduling anything once shutdown has been
    /// requested. The timer removes itself from the registry before `task`
    /// starts, so a running job body is never aborted by `cancel_all()`.
    pub fn schedule_after<F>(self: &Arc<Self>, delay: Duration, task: F) -> Option<TimerId>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutdown() {
            debug!("Shutdown requested, not scheduling timer");
            return None;
        }

        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registry = Arc::clone(self);
        // The timer must not fire before its handle is registered
        let (armed_tx, armed_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            if armed_rx.await.is_err() {
                return;
            }
            tokio::time::sleep(delay).await;
            if registry.pending.remove(&id).is_none() || registry.is_shutdown() {
                return;
            }
            task.await;
        });

        self.pending.insert(id, handle.abort_handle());
        let _ = armed_tx.send(());

        // cancel_all() may have swept the set between the check above and the insert
        if self.is_shutdown() {
            if let Some((_, handle)) = self.pending.remove(&id) {
                handle.abort();
            }
            return None;
        }

        debug!("Scheduled {} in {:?}", id, delay);
        Some(id)
    }

    /// Delay until the next minute boundary on this registry's clock
    #[must_use]
    pub fn delay_to_next_minute(&self, jitter: Duration) -> Duration {
        delay_to_next_minute(self.clock.now_millis(), jitter)
    }

    /// Delay until the next hour boundary on this registry's clock
    #[must_use]
    pub fn delay_to_next_hour(&self, jitter: Duration) -> Duration {
        delay_to_next_hour(self.clock.now_millis(), jitter)
    }

    /// Set the shutdown flag and abort every pending timer
    ///
    /// Idempotent. Returns the number of timers cancelled by this call.
    pub fn cancel_all(&self) -> usize {
        let first_call = !self.shutdown.swap(true, Ordering::SeqCst);

        let ids: Vec<TimerId> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut cancelled = 0;
        for id in ids {
            if let Some((_, handle)) = self.pending.remove(&id) {
                handle.abort();
                cancelled += 1;
            }
        }

        if first_call {
            info!("Cancelled {} pending timer(s)", cancelled);
        }
        cancelled
    }

    #[must_use]
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Number of timers waiting to fire
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
