//! Telemetry records moved and produced by the worker
//!
//! Timestamps are Unix epoch milliseconds throughout.

use crate::constants::{aggregation, clock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One observed request, as stored in the raw-metric store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetric {
    pub timestamp: i64,
    pub service: String,
    pub path: String,
    pub status_code: u16,
    pub latency_ms: f64,
}

impl RawMetric {
    /// Whether the response counts towards `error_count`
    #[must_use]
    #[inline]
    pub fn is_error(&self) -> bool {
        self.status_code >= aggregation::ERROR_STATUS_THRESHOLD
    }
}

/// Metric entry as producers push it onto the fast queue
///
/// Producers may omit `timestamp`; the drain job stamps it with its own clock.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMetric {
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub service: String,
    pub path: String,
    pub status_code: u16,
    pub latency_ms: f64,
}

impl QueuedMetric {
    /// Parse one serialized queue entry
    ///
    /// Returns `None` for anything that is not a usable metric: invalid JSON,
    /// missing fields, an empty service name or a negative latency.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let metric: Self = serde_json::from_str(raw).ok()?;
        let usable = !metric.service.trim().is_empty()
            && metric.latency_ms.is_finite()
            && metric.latency_ms >= 0.0;
        usable.then_some(metric)
    }

    /// Convert into a stored metric, filling a missing timestamp with `now_ms`
    #[must_use]
    pub fn into_raw(self, now_ms: i64) -> RawMetric {
        RawMetric {
            timestamp: self.timestamp.unwrap_or(now_ms),
            service: self.service,
            path: self.path,
            status_code: self.status_code,
            latency_ms: self.latency_ms,
        }
    }
}

/// One opaque log line, stored verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawLogEntry(pub serde_json::Value);

impl RawLogEntry {
    /// Parse one serialized queue entry; `None` if it is not valid JSON
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok().map(Self)
    }

    #[must_use]
    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Half-open time interval `[start_ms, end_ms)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Window {
    /// The full minute that ended at the last minute boundary before `now_ms`
    ///
    /// ```
    /// use telemetry_worker::types::Window;
    ///
    /// // 12:01:30.500 aggregates 12:00:00 .. 12:01:00
    /// let window = Window::previous_minute(60_000 * 721 + 30_500);
    /// assert_eq!(window.end_ms, 60_000 * 721);
    /// assert_eq!(window.start_ms, 60_000 * 720);
    /// ```
    #[must_use]
    pub fn previous_minute(now_ms: i64) -> Self {
        let end_ms = now_ms - now_ms.rem_euclid(clock::MINUTE_MS);
        Self {
            start_ms: end_ms - clock::MINUTE_MS,
            end_ms,
        }
    }

    #[must_use]
    #[inline]
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms < self.end_ms
    }
}

/// Raw metrics of one `(service, path)` pair within a window
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricGroup {
    pub service: String,
    pub path: String,
    pub count: u64,
    pub error_count: u64,
    pub total_latency_ms: f64,
    pub latencies: Vec<f64>,
}

impl MetricGroup {
    #[must_use]
    pub fn new(service: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Fold one raw metric into the group
    pub fn record(&mut self, metric: &RawMetric) {
        self.count += 1;
        if metric.is_error() {
            self.error_count += 1;
        }
        self.total_latency_ms += metric.latency_ms;
        self.latencies.push(metric.latency_ms);
    }

    /// Group metrics by `(service, path)`, keeping only those inside `window`
    ///
    /// Groups come back ordered by service then path. Storage engines that
    /// cannot group natively feed their window scan through this.
    pub fn group_in_window<'a, I>(metrics: I, window: Window) -> Vec<Self>
    where
        I: IntoIterator<Item = &'a RawMetric>,
    {
        Self::group(
            metrics
                .into_iter()
                .filter(|metric| window.contains(metric.timestamp)),
        )
    }

    /// Group metrics by `(service, path)`, ordered by service then path
    pub fn group<'a, I>(metrics: I) -> Vec<Self>
    where
        I: IntoIterator<Item = &'a RawMetric>,
    {
        let mut groups: BTreeMap<(String, String), Self> = BTreeMap::new();
        for metric in metrics {
            groups
                .entry((metric.service.clone(), metric.path.clone()))
                .or_insert_with(|| Self::new(metric.service.as_str(), metric.path.as_str()))
                .record(metric);
        }
        groups.into_values().collect()
    }
}

/// Per-minute, per-(service, path) summary row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetric {
    pub window_start: i64,
    pub window_end: i64,
    pub window_size: String,
    pub service: String,
    pub path: String,
    pub count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub error_rate: f64,
}

impl AggregatedMetric {
    /// Whether a store can accept this row
    ///
    /// Rows with non-finite statistics or no service are rejected
    /// individually by unordered inserts.
    #[must_use]
    pub fn is_storable(&self) -> bool {
        !self.service.is_empty()
            && self.avg_latency_ms.is_finite()
            && self.p95_latency_ms.is_finite()
            && self.error_rate.is_finite()
    }
}

/// Result of an unordered bulk insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertReport {
    pub inserted: usize,
    pub failed: usize,
}

impl InsertReport {
    /// Report for a batch that was written in full
    #[must_use]
    pub const fn all(inserted: usize) -> Self {
        Self {
            inserted,
            failed: 0,
        }
    }

    /// Sum two reports
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            inserted: self.inserted + other.inserted,
            failed: self.failed + other.failed,
        }
    }
}
