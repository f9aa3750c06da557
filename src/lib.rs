//! # Telemetry Worker
//!
//! Background worker for a platform's request telemetry. Three cooperating
//! jobs run on a tokio runtime:
//!
//! - **Drain**: moves serialized logs and metrics from a fast queue (Redis
//!   lists) into durable storage, polling faster while the queue is full
//! - **Aggregation**: once a minute, rolls the previous minute of raw
//!   metrics up into per-`(service, path)` summaries
//! - **Cleanup**: once an hour, deletes raw metrics past the retention period
//!
//! Storage and queue access go through traits ([`store`], [`queue`]) with
//! in-memory and SQLite/Redis implementations.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use telemetry_worker::{Config, MemoryQueue, MemoryStore, TelemetryWorker};
//!
//! # async fn run() -> Result<(), telemetry_worker::WorkerError> {
//! let worker = TelemetryWorker::builder_with_store(
//!     Config::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryQueue::new()),
//! )
//! .build();
//!
//! worker.start().await?;
//! // ... later
//! worker.shutdown(Duration::from_secs(10)).await;
//! # Ok(())
//! # }
//! ```

// Module declarations
mod args;
pub mod alert;
pub mod clock;
pub mod config;
pub mod constants;
pub mod deps;
pub mod error;
pub mod jobs;
pub mod lease;
pub mod logging;
pub mod queue;
pub mod runtime;
pub mod stats;
pub mod store;
pub mod timer;
pub mod types;
pub mod worker;

// Public exports
pub use alert::{AlertCheck, AlertError, NoopAlertCheck, ThresholdAlertCheck};
pub use args::Args;
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::{
    Config, ConfigSource, create_default_config, load_config, load_config_from_env,
    load_config_with_fallback,
};
pub use deps::{Dependencies, DependencyResolver, SharedDependencies};
pub use error::{QueueError, StoreError, WorkerError};
pub use lease::{JobLease, LeaseTerm, LocalLease, StoreLease};
pub use queue::{FastQueue, MemoryQueue, RedisQueue};
pub use stats::StatsSnapshot;
pub use store::{LeaseStore, LogStore, MemoryStore, RawMetricStore, RollupStore, SqliteStore};
pub use types::JobKind;
pub use worker::{TelemetryWorker, TelemetryWorkerBuilder};
