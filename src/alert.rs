//! Alert checks run on freshly drained metric batches
//!
//! The drain job hands every inserted batch to an [`AlertCheck`] on a
//! detached task. Failures end up in the worker counters and logs only.

use crate::clock::Clock;
use crate::config::AlertConfig;
use crate::error::QueueError;
use crate::queue::FastQueue;
use crate::types::{MetricGroup, RawMetric};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Errors raised while evaluating or publishing alerts
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AlertError {
    #[error("failed to publish alert: {0}")]
    Publish(#[from] QueueError),

    #[error("failed to encode alert: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Collaborator invoked with each drained metric batch
#[async_trait]
pub trait AlertCheck: Send + Sync + std::fmt::Debug {
    async fn check(&self, batch: &[RawMetric], queue: &dyn FastQueue) -> Result<(), AlertError>;
}

/// Alert check that accepts every batch
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAlertCheck;

#[async_trait]
impl AlertCheck for NoopAlertCheck {
    async fn check(&self, _batch: &[RawMetric], _queue: &dyn FastQueue) -> Result<(), AlertError> {
        Ok(())
    }
}

/// Why a group alerted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    ErrorRate,
    Latency,
}

/// Alert event published to the optional alert list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub service: String,
    pub path: String,
    pub reason: AlertReason,
    pub count: u64,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub timestamp: i64,
}

/// Per-`(service, path)` threshold check over one batch
///
/// A group alerts when it has at least `min_samples` entries and its error
/// rate or average latency exceeds the configured threshold. After alerting,
/// the same key stays quiet for `cooldown`.
#[derive(Debug)]
pub struct ThresholdAlertCheck {
    config: AlertConfig,
    clock: Arc<dyn Clock>,
    last_fired: DashMap<(String, String), i64>,
}

impl ThresholdAlertCheck {
    pub fn new(config: AlertConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            last_fired: DashMap::new(),
        }
    }

    /// Evaluate one group, returning the reason it breaches a threshold
    fn evaluate(&self, group: &MetricGroup) -> Option<AlertReason> {
        if group.count == 0 || group.count < self.config.min_samples {
            return None;
        }
        let error_rate = group.error_count as f64 / group.count as f64 * 100.0;
        let avg_latency = group.total_latency_ms / group.count as f64;

        if error_rate > self.config.error_rate_threshold {
            Some(AlertReason::ErrorRate)
        } else if avg_latency > self.config.avg_latency_threshold_ms {
            Some(AlertReason::Latency)
        } else {
            None
        }
    }

    /// Record a firing for `key` unless it is still cooling down
    fn claim(&self, key: (String, String), now_ms: i64) -> bool {
        let cooldown_ms = self.config.cooldown.as_millis() as i64;
        let mut entry = self.last_fired.entry(key).or_insert(i64::MIN);
        if *entry != i64::MIN && now_ms - *entry < cooldown_ms {
            return false;
        }
        *entry = now_ms;
        true
    }
}

#[async_trait]
impl AlertCheck for ThresholdAlertCheck {
    async fn check(&self, batch: &[RawMetric], queue: &dyn FastQueue) -> Result<(), AlertError> {
        if !self.config.enabled {
            return Ok(());
        }

        let now = self.clock.now_millis();
        let mut events = Vec::new();
        for group in MetricGroup::group(batch) {
            let Some(reason) = self.evaluate(&group) else {
                continue;
            };
            if !self.claim((group.service.clone(), group.path.clone()), now) {
                continue;
            }

            let event = AlertEvent {
                error_rate: group.error_count as f64 / group.count as f64 * 100.0,
                avg_latency_ms: group.total_latency_ms / group.count as f64,
                count: group.count,
                service: group.service,
                path: group.path,
                reason,
                timestamp: now,
            };
            warn!(
                service = %event.service,
                path = %event.path,
                reason = ?event.reason,
                "Alert: error rate {:.1}%, avg latency {:.1}ms over {} requests",
                event.error_rate,
                event.avg_latency_ms,
                event.count
            );
            events.push(event);
        }

        if let Some(list) = &self.config.alert_list {
            for event in &events {
                queue.push(list, serde_json::to_string(event)?).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::queue::MemoryQueue;
    use std::time::Duration;

    fn metric(status: u16, latency: f64) -> RawMetric {
        RawMetric {
            timestamp: 0,
            service: "api".to_string(),
            path: "/lessons".to_string(),
            status_code: status,
            latency_ms: latency,
        }
    }

    fn config() -> AlertConfig {
        AlertConfig {
            min_samples: 2,
            cooldown: Duration::from_secs(60),
            alert_list: Some("telemetry:alerts".to_string()),
            ..AlertConfig::default()
        }
    }

    #[tokio::test]
    async fn test_error_rate_alert_published() {
        let clock = Arc::new(ManualClock::new(1_000));
        let check = ThresholdAlertCheck::new(config(), clock);
        let queue = MemoryQueue::new();

        check
            .check(&[metric(500, 10.0), metric(503, 10.0)], &queue)
            .await
            .unwrap();

        let published = queue.pop_batch("telemetry:alerts", 10).await.unwrap();
        assert_eq!(published.len(), 1);
        let event: serde_json::Value = serde_json::from_str(&published[0]).unwrap();
        assert_eq!(event["reason"], "error_rate");
        assert_eq!(event["errorRate"], 100.0);
    }

    #[tokio::test]
    async fn test_below_min_samples_never_alerts() {
        let check = ThresholdAlertCheck::new(config(), Arc::new(ManualClock::new(0)));
        let queue = MemoryQueue::new();

        check.check(&[metric(500, 10.0)], &queue).await.unwrap();
        assert!(queue.is_empty("telemetry:alerts"));
    }

    #[tokio::test]
    async fn test_latency_alert() {
        let check = ThresholdAlertCheck::new(config(), Arc::new(ManualClock::new(0)));
        let queue = MemoryQueue::new();

        check
            .check(&[metric(200, 5_000.0), metric(200, 3_000.0)], &queue)
            .await
            .unwrap();

        let published = queue.pop_batch("telemetry:alerts", 10).await.unwrap();
        assert_eq!(published.len(), 1);
        assert!(published[0].contains("\"latency\""));
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_repeat_alerts() {
        let clock = Arc::new(ManualClock::new(0));
        let check = ThresholdAlertCheck::new(config(), clock.clone());
        let queue = MemoryQueue::new();
        let batch = [metric(500, 10.0), metric(500, 10.0)];

        check.check(&batch, &queue).await.unwrap();
        clock.advance(30_000);
        check.check(&batch, &queue).await.unwrap();
        assert_eq!(queue.len("telemetry:alerts"), 1);

        clock.advance(30_000);
        check.check(&batch, &queue).await.unwrap();
        assert_eq!(queue.len("telemetry:alerts"), 2);
    }

    #[tokio::test]
    async fn test_publish_failure_surfaces_as_error() {
        let check = ThresholdAlertCheck::new(config(), Arc::new(ManualClock::new(0)));
        let queue = MemoryQueue::new();
        queue.set_unavailable(true);

        let result = check
            .check(&[metric(500, 10.0), metric(500, 10.0)], &queue)
            .await;
        assert!(matches!(result, Err(AlertError::Publish(_))));
    }

    #[tokio::test]
    async fn test_disabled_check_is_silent() {
        let config = AlertConfig {
            enabled: false,
            ..config()
        };
        let check = ThresholdAlertCheck::new(config, Arc::new(ManualClock::new(0)));
        let queue = MemoryQueue::new();

        check
            .check(&[metric(500, 10.0), metric(500, 10.0)], &queue)
            .await
            .unwrap();
        assert!(queue.is_empty("telemetry:alerts"));
    }
}
