//! Configuration module
//!
//! This module handles all configuration types and loading
//! for the telemetry worker.

mod defaults;
mod loading;
mod types;
mod validation;

// Re-export public types
pub use loading::{
    ConfigSource, ENV_DB_PATH, ENV_REDIS_URL, ENV_RETENTION_SECS, apply_env_overrides,
    create_default_config, load_config, load_config_from_env, load_config_with_fallback,
};
pub use types::{AlertConfig, Config, LeaseConfig, QueueConfig, StorageConfig, WorkerConfig};

// Re-export default functions for use in tests and other modules
pub use defaults::{
    drain_busy_delay, drain_idle_delay, insert_chunk_size, log_batch_size, metric_batch_size,
    retention,
};
