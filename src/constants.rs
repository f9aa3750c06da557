//! Constants used throughout the telemetry worker
//!
//! These are the built-in defaults; most of them can be overridden from the
//! `[worker]` section of the configuration file.

use std::time::Duration;

/// Queue drain constants
pub mod drain {
    use super::Duration;

    /// Maximum log entries popped per tick
    pub const LOG_BATCH_SIZE: usize = 100;

    /// Maximum metric entries popped per tick
    pub const METRIC_BATCH_SIZE: usize = 100;

    /// Delay before the next tick when a stream hit its batch cap
    pub const BUSY_DELAY: Duration = Duration::from_millis(10);

    /// Delay before the next tick when the queue looked quiet
    pub const IDLE_DELAY: Duration = Duration::from_secs(5);

    /// Delay between `start()` and the first drain tick
    pub const WARMUP_DELAY: Duration = Duration::from_secs(1);

    /// Default queue list holding serialized log entries
    pub const LOGS_LIST: &str = "telemetry:logs";

    /// Default queue list holding serialized metric entries
    pub const METRICS_LIST: &str = "telemetry:metrics";
}

/// Rollup constants
pub mod aggregation {
    use super::Duration;

    /// Length of one aggregation window
    pub const WINDOW: Duration = Duration::from_secs(60);

    /// Label stored on every rollup row
    pub const WINDOW_LABEL: &str = "1m";

    /// Percentile reported as `p95_latency_ms`
    pub const PERCENTILE: f64 = 0.95;

    /// Status codes at or above this count as errors
    pub const ERROR_STATUS_THRESHOLD: u16 = 400;

    /// Delay past the minute boundary so late writes for the window land first
    pub const JITTER: Duration = Duration::from_secs(5);
}

/// Retention constants
pub mod retention {
    use super::Duration;

    /// Raw metrics older than this are deleted
    pub const RAW_METRICS: Duration = Duration::from_secs(24 * 60 * 60);

    /// Delay past the hour boundary before cleanup runs
    pub const JITTER: Duration = Duration::from_secs(30);

    /// Retention below this is allowed but logged as suspicious
    pub const MIN_RECOMMENDED: Duration = Duration::from_secs(60 * 60);
}

/// Write path constants shared by every job
pub mod write {
    /// Documents per bulk insert
    pub const CHUNK_SIZE: usize = 50;

    /// Yield to the runtime after building this many documents
    pub const YIELD_EVERY: usize = 20;
}

/// Shutdown and lease constants
pub mod lifecycle {
    use super::Duration;

    /// Time `shutdown()` waits for in-flight jobs in the binary
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

    /// Lease TTL for cross-process job leases
    pub const LEASE_TTL: Duration = Duration::from_secs(10 * 60);
}

/// Wall-clock constants
pub mod clock {
    /// Milliseconds per minute
    pub const MINUTE_MS: i64 = 60_000;

    /// Milliseconds per hour
    pub const HOUR_MS: i64 = 60 * MINUTE_MS;

    const _WINDOW_IS_ONE_MINUTE: () = assert!(
        super::aggregation::WINDOW.as_millis() == MINUTE_MS as u128,
        "aggregation windows must be one minute"
    );
}
