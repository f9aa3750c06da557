//! Configuration validation
//!
//! Non-zero sizes are already enforced by the types; this checks the
//! relationships between fields before the worker starts.

use anyhow::Result;

use super::types::{AlertConfig, Config, WorkerConfig};
use crate::constants::retention::MIN_RECOMMENDED;

impl Config {
    /// Validate configuration for correctness
    ///
    /// - Retention must be non-zero
    /// - Insert chunks must not exceed either batch size
    /// - The busy drain delay must be shorter than the idle delay
    /// - Queue list names must be distinct and non-empty
    /// - Alert thresholds must be non-negative
    pub fn validate(&self) -> Result<()> {
        validate_worker(&self.worker)?;

        if self.queue.logs_list.trim().is_empty() || self.queue.metrics_list.trim().is_empty() {
            return Err(anyhow::anyhow!("Queue list names cannot be empty"));
        }
        if self.queue.logs_list == self.queue.metrics_list {
            return Err(anyhow::anyhow!(
                "Logs and metrics must use different queue lists (both are '{}')",
                self.queue.logs_list
            ));
        }

        if self.alert.enabled {
            validate_alert(&self.alert)?;
        }

        if self.lease.enabled && self.lease.ttl.is_zero() {
            return Err(anyhow::anyhow!("Lease TTL must be greater than zero"));
        }

        Ok(())
    }
}

fn validate_worker(worker: &WorkerConfig) -> Result<()> {
    if worker.retention.is_zero() {
        return Err(anyhow::anyhow!("Retention must be greater than zero"));
    }
    if worker.retention < MIN_RECOMMENDED {
        tracing::warn!(
            "Retention is {:?} (< {:?}); raw metrics may be deleted before they are aggregated",
            worker.retention,
            MIN_RECOMMENDED
        );
    }

    let chunk = worker.insert_chunk_size.get();
    if chunk > worker.log_batch_size.get() || chunk > worker.metric_batch_size.get() {
        return Err(anyhow::anyhow!(
            "insert_chunk_size ({}) cannot exceed log_batch_size ({}) or metric_batch_size ({})",
            chunk,
            worker.log_batch_size,
            worker.metric_batch_size
        ));
    }

    if worker.drain_busy_delay >= worker.drain_idle_delay {
        return Err(anyhow::anyhow!(
            "drain_busy_delay ({:?}) must be shorter than drain_idle_delay ({:?})",
            worker.drain_busy_delay,
            worker.drain_idle_delay
        ));
    }

    Ok(())
}

fn validate_alert(alert: &AlertConfig) -> Result<()> {
    if !(alert.error_rate_threshold.is_finite() && alert.error_rate_threshold >= 0.0) {
        return Err(anyhow::anyhow!(
            "alert.error_rate_threshold must be a non-negative percentage"
        ));
    }
    if !(alert.avg_latency_threshold_ms.is_finite() && alert.avg_latency_threshold_ms >= 0.0) {
        return Err(anyhow::anyhow!(
            "alert.avg_latency_threshold_ms must be non-negative"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatchSize, ChunkSize};
    use std::time::Duration;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_retention_rejected() {
        let mut config = Config::default();
        config.worker.retention = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Retention"));
    }

    #[test]
    fn test_chunk_larger_than_batch_rejected() {
        let mut config = Config::default();
        config.worker.log_batch_size = BatchSize::new(10).unwrap();
        config.worker.insert_chunk_size = ChunkSize::new(50).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_busy_delay_must_be_shorter_than_idle() {
        let mut config = Config::default();
        config.worker.drain_busy_delay = Duration::from_secs(10);
        config.worker.drain_idle_delay = Duration::from_secs(5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_list_names_rejected() {
        let mut config = Config::default();
        config.queue.metrics_list = config.queue.logs_list.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_alert_threshold_rejected() {
        let mut config = Config::default();
        config.alert.error_rate_threshold = -1.0;
        assert!(config.validate().is_err());

        config.alert.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_lease_ttl_rejected_when_enabled() {
        let mut config = Config::default();
        config.lease.ttl = Duration::ZERO;
        assert!(config.validate().is_ok());
        config.lease.enabled = true;
        assert!(config.validate().is_err());
    }
}
