//! Core types shared by the jobs, stores and configuration

pub mod config;
pub mod telemetry;

pub use config::{BatchSize, ChunkSize, ThreadCount, duration_serde, millis_serde};
pub use telemetry::{
    AggregatedMetric, InsertReport, MetricGroup, QueuedMetric, RawLogEntry, RawMetric, Window,
};

use serde::{Deserialize, Serialize};

/// The three background jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Per-minute metric rollups
    Aggregation,
    /// Fast queue to durable storage
    Drain,
    /// Raw metric retention
    Cleanup,
}

impl JobKind {
    /// Every job kind, in start order
    pub const ALL: [Self; 3] = [Self::Aggregation, Self::Drain, Self::Cleanup];

    /// Stable name, used for log fields and lease keys
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregation => "aggregation",
            Self::Drain => "drain",
            Self::Cleanup => "cleanup",
        }
    }

    #[must_use]
    #[inline]
    pub(crate) const fn index(&self) -> usize {
        match self {
            Self::Aggregation => 0,
            Self::Drain => 1,
            Self::Cleanup => 2,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_indices_are_distinct() {
        let mut seen = [false; 3];
        for kind in JobKind::ALL {
            assert!(!seen[kind.index()]);
            seen[kind.index()] = true;
        }
    }

    #[test]
    fn test_job_kind_display() {
        assert_eq!(JobKind::Aggregation.to_string(), "aggregation");
        assert_eq!(JobKind::Drain.to_string(), "drain");
        assert_eq!(JobKind::Cleanup.to_string(), "cleanup");
    }
}
