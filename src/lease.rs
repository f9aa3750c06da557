//! Mutual exclusion for job runs
//!
//! [`RunFlags`] keeps at most one run of each job kind in flight inside one
//! worker. A [`JobLease`] extends that across replicas: with
//! [`StoreLease`] every run must also hold a record in the shared
//! [`LeaseStore`]. Drain holds it for one run; the clock-triggered jobs hold
//! it until the next boundary, so each window runs on exactly one replica.

use crate::clock::Clock;
use crate::store::LeaseStore;
use crate::types::JobKind;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Per-job "running" flags for one worker
#[derive(Debug, Default)]
pub struct RunFlags {
    running: [AtomicBool; 3],
    idle: Notify,
}

impl RunFlags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `job` as running, or return `None` if a run is already in flight
    ///
    /// The flag clears when the returned guard drops, however the run ends.
    pub fn try_enter(&self, job: JobKind) -> Option<RunGuard<'_>> {
        self.running[job.index()]
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard { flags: self, job })
    }

    #[must_use]
    pub fn is_running(&self, job: JobKind) -> bool {
        self.running[job.index()].load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn any_running(&self) -> bool {
        JobKind::ALL.iter().any(|job| self.is_running(*job))
    }

    /// Resolve once no job is running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.any_running() {
                return;
            }
            notified.await;
        }
    }
}

/// Clears a job's running flag on drop
#[derive(Debug)]
pub struct RunGuard<'a> {
    flags: &'a RunFlags,
    job: JobKind,
}

impl RunGuard<'_> {
    #[must_use]
    pub fn job(&self) -> JobKind {
        self.job
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flags.running[self.job.index()].store(false, Ordering::SeqCst);
        self.flags.idle.notify_waiters();
    }
}

/// How long a run keeps its lease
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseTerm {
    /// Released when the run ends; the TTL only bounds a crashed holder
    Run,
    /// Kept until `until_ms` (the next schedule boundary) and never released
    Period { until_ms: i64 },
}

impl LeaseTerm {
    #[must_use]
    pub const fn released_after_run(self) -> bool {
        matches!(self, Self::Run)
    }
}

/// Cross-process exclusion for job runs
#[async_trait]
pub trait JobLease: Send + Sync + std::fmt::Debug {
    /// Try to take the lease for a run of `job`, held for `term`
    ///
    /// Errors talking to the lease backend count as "not acquired".
    async fn acquire(&self, job: JobKind, term: LeaseTerm) -> bool;

    /// Give a [`LeaseTerm::Run`] lease back after the run
    async fn release(&self, job: JobKind);
}

/// Single-instance deployments: the in-process flags are enough
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalLease;

#[async_trait]
impl JobLease for LocalLease {
    async fn acquire(&self, _job: JobKind, _term: LeaseTerm) -> bool {
        true
    }

    async fn release(&self, _job: JobKind) {}
}

/// Lease records in a shared store, keyed `job:<name>`
///
/// A replica that dies mid-run blocks a [`LeaseTerm::Run`] job for at most
/// `ttl`, and a [`LeaseTerm::Period`] job until the period ends.
#[derive(Debug, Clone)]
pub struct StoreLease {
    store: Arc<dyn LeaseStore>,
    holder: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl StoreLease {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        holder: impl Into<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            holder: holder.into(),
            ttl,
            clock,
        }
    }

    #[must_use]
    pub fn holder(&self) -> &str {
        &self.holder
    }

    fn key(job: JobKind) -> String {
        format!("job:{}", job.as_str())
    }
}

#[async_trait]
impl JobLease for StoreLease {
    async fn acquire(&self, job: JobKind, term: LeaseTerm) -> bool {
        let now = self.clock.now_millis();
        let expires = match term {
            LeaseTerm::Run => {
                let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
                now.saturating_add(ttl_ms)
            }
            LeaseTerm::Period { until_ms } => until_ms.max(now + 1),
        };
        match self
            .store
            .try_acquire_lease(&Self::key(job), &self.holder, now, expires)
            .await
        {
            Ok(acquired) => {
                if !acquired {
                    debug!("Lease for {} held by another replica", job);
                }
                acquired
            }
            Err(e) => {
                warn!("Failed to acquire lease for {}: {}", job, e);
                false
            }
        }
    }

    async fn release(&self, job: JobKind) {
        if let Err(e) = self.store.release_lease(&Self::key(job), &self.holder).await {
            warn!("Failed to release lease for {}: {}", job, e);
        }
    }
}
