//! Worker lifecycle and control surface
//!
//! [`TelemetryWorker`] owns the state shared by the three jobs and exposes
//! `start`, `stop`, `shutdown`, `stats`, plus manual triggers for each job.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::alert::{AlertCheck, ThresholdAlertCheck};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, QueueConfig, WorkerConfig};
use crate::deps::SharedDependencies;
use crate::error::WorkerError;
use crate::jobs::{self, AggregationReport, CleanupReport, DrainReport};
use crate::lease::{JobLease, LocalLease, RunFlags};
use crate::queue::FastQueue;
use crate::stats::{StatsSnapshot, WorkerStats};
use crate::store::{LogStore, RawMetricStore, RollupStore};
use crate::timer::TimerRegistry;
use crate::types::JobKind;

/// Everything a job body needs, shared by `Arc`
#[derive(Debug)]
pub(crate) struct WorkerContext {
    pub(crate) timers: Arc<TimerRegistry>,
    pub(crate) flags: RunFlags,
    pub(crate) lease: Arc<dyn JobLease>,
    pub(crate) stats: Arc<WorkerStats>,
    pub(crate) raw_metrics: Arc<dyn RawMetricStore>,
    pub(crate) rollups: Arc<dyn RollupStore>,
    pub(crate) deps: SharedDependencies,
    pub(crate) alert: Arc<dyn AlertCheck>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) settings: WorkerConfig,
    pub(crate) queue: QueueConfig,
}

/// Builder for [`TelemetryWorker`]
///
/// The stores and dependencies are required; the clock defaults to the
/// system clock, the lease to [`LocalLease`] and the alert check to a
/// [`ThresholdAlertCheck`] built from `config.alert`.
///
/// ```no_run
/// # async fn run() -> Result<(), telemetry_worker::WorkerError> {
/// use std::sync::Arc;
/// use telemetry_worker::{Config, MemoryQueue, MemoryStore, SharedDependencies, TelemetryWorker};
///
/// let store = Arc::new(MemoryStore::new());
/// let deps = SharedDependencies::resolved(Arc::new(MemoryQueue::new()), store.clone());
/// let worker = TelemetryWorker::builder(Config::default(), store.clone(), store, deps).build();
/// worker.start().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TelemetryWorkerBuilder {
    config: Config,
    raw_metrics: Arc<dyn RawMetricStore>,
    rollups: Arc<dyn RollupStore>,
    deps: SharedDependencies,
    lease: Option<Arc<dyn JobLease>>,
    alert: Option<Arc<dyn AlertCheck>>,
    clock: Option<Arc<dyn Clock>>,
}

impl TelemetryWorkerBuilder {
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Require a lease for every run, e.g. a [`crate::lease::StoreLease`]
    #[must_use]
    pub fn with_lease(mut self, lease: Arc<dyn JobLease>) -> Self {
        self.lease = Some(lease);
        self
    }

    #[must_use]
    pub fn with_alert_check(mut self, alert: Arc<dyn AlertCheck>) -> Self {
        self.alert = Some(alert);
        self
    }

    #[must_use]
    pub fn build(self) -> TelemetryWorker {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let alert = self.alert.unwrap_or_else(|| {
            Arc::new(ThresholdAlertCheck::new(
                self.config.alert.clone(),
                Arc::clone(&clock),
            ))
        });

        let ctx = WorkerContext {
            timers: Arc::new(TimerRegistry::new(Arc::clone(&clock))),
            flags: RunFlags::new(),
            lease: self.lease.unwrap_or_else(|| Arc::new(LocalLease)),
            stats: Arc::new(WorkerStats::new()),
            raw_metrics: self.raw_metrics,
            rollups: self.rollups,
            deps: self.deps,
            alert,
            clock,
            settings: self.config.worker,
            queue: self.config.queue,
        };

        TelemetryWorker {
            ctx: Arc::new(ctx),
            started: AtomicBool::new(false),
        }
    }
}

/// The telemetry aggregation worker
#[derive(Debug)]
pub struct TelemetryWorker {
    ctx: Arc<WorkerContext>,
    started: AtomicBool,
}

impl TelemetryWorker {
    pub fn builder(
        config: Config,
        raw_metrics: Arc<dyn RawMetricStore>,
        rollups: Arc<dyn RollupStore>,
        deps: SharedDependencies,
    ) -> TelemetryWorkerBuilder {
        TelemetryWorkerBuilder {
            config,
            raw_metrics,
            rollups,
            deps,
            lease: None,
            alert: None,
            clock: None,
        }
    }

    /// Builder for a worker whose raw metrics, rollups and logs share one store
    pub fn builder_with_store<S>(
        config: Config,
        store: Arc<S>,
        queue: Arc<dyn FastQueue>,
    ) -> TelemetryWorkerBuilder
    where
        S: RawMetricStore + RollupStore + LogStore + 'static,
    {
        let deps = SharedDependencies::resolved(queue, store.clone() as Arc<dyn LogStore>);
        Self::builder(
            config,
            store.clone() as Arc<dyn RawMetricStore>,
            store as Arc<dyn RollupStore>,
            deps,
        )
    }

    /// Schedule the three jobs
    ///
    /// Aggregation fires at the next minute boundary, cleanup at the next
    /// hour boundary (both plus jitter), and drain after the warm-up delay.
    /// A dependency resolution failure here is only logged; the drain job
    /// retries it on every tick.
    pub async fn start(&self) -> Result<(), WorkerError> {
        if self.ctx.timers.is_shutdown() {
            return Err(WorkerError::ShutdownRequested);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(WorkerError::AlreadyStarted);
        }

        if let Err(e) = self.ctx.deps.get().await {
            warn!("Dependency pre-warm failed, drain will retry: {}", e);
        }

        jobs::aggregation::schedule(&self.ctx);
        jobs::drain::schedule(&self.ctx, self.ctx.settings.drain_warmup);
        jobs::cleanup::schedule(&self.ctx);

        info!(
            "Telemetry worker started ({} timer(s) pending)",
            self.ctx.timers.pending_count()
        );
        Ok(())
    }

    /// Stop scheduling and cancel every pending timer
    ///
    /// Idempotent. Job bodies already running finish on their own; use
    /// [`Self::shutdown`] to wait for them. No job body starts afterwards.
    pub fn stop(&self) {
        self.ctx.timers.cancel_all();
    }

    /// Stop, then wait up to `timeout` for running jobs to finish
    ///
    /// Returns `true` when no job was still running at the end.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.stop();
        match tokio::time::timeout(timeout, self.ctx.flags.wait_idle()).await {
            Ok(()) => {
                info!("Telemetry worker stopped");
                true
            }
            Err(_) => {
                let running: Vec<&str> = JobKind::ALL
                    .iter()
                    .filter(|job| self.ctx.flags.is_running(**job))
                    .map(|job| job.as_str())
                    .collect();
                warn!(
                    "Shutdown timed out after {:?} with jobs still running: {}",
                    timeout,
                    running.join(", ")
                );
                false
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// Whether a run of `job` is in flight
    #[must_use]
    pub fn is_running(&self, job: JobKind) -> bool {
        self.ctx.flags.is_running(job)
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.ctx.timers.is_shutdown()
    }

    /// Number of armed timers
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.ctx.timers.pending_count()
    }

    /// Aggregate the previous minute now
    ///
    /// `Ok(None)` if skipped, or once the worker has been stopped.
    pub async fn run_aggregation_now(&self) -> Result<Option<AggregationReport>, WorkerError> {
        jobs::aggregation::run(&self.ctx).await
    }

    /// Drain both lists once now; `None` if skipped or stopped
    pub async fn run_drain_now(&self) -> Option<DrainReport> {
        jobs::drain::run(&self.ctx).await
    }

    /// Delete expired raw metrics now; `Ok(None)` if skipped or stopped
    pub async fn run_cleanup_now(&self) -> Result<Option<CleanupReport>, WorkerError> {
        jobs::cleanup::run(&self.ctx).await
    }
}
