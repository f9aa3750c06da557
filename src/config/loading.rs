//! Configuration loading from files and environment variables
//!
//! This module handles loading configuration from TOML files and environment variables,
//! with environment variables taking precedence for container deployments.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::Config;

/// Environment variable overriding `queue.url`
pub const ENV_REDIS_URL: &str = "TELEMETRY_REDIS_URL";
/// Environment variable overriding `storage.path`
pub const ENV_DB_PATH: &str = "TELEMETRY_DB_PATH";
/// Environment variable overriding `worker.retention`, in seconds
pub const ENV_RETENTION_SECS: &str = "TELEMETRY_RETENTION_SECS";

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Loaded from a TOML file (plus environment overrides)
    File(PathBuf),
    /// Built from defaults and environment variables only
    Environment,
}

impl ConfigSource {
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::File(path) => format!("file '{}'", path.display()),
            Self::Environment => "defaults and environment variables".to_string(),
        }
    }
}

/// Apply environment variable overrides on top of `config`
///
/// - `TELEMETRY_REDIS_URL` - fast queue URL
/// - `TELEMETRY_DB_PATH` - SQLite database file
/// - `TELEMETRY_RETENTION_SECS` - raw metric retention in seconds
///
/// Unparsable values are ignored with a warning.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_REDIS_URL) {
        tracing::info!("Using queue URL from {}", ENV_REDIS_URL);
        config.queue.url = url;
    }

    if let Some(path) = lookup(ENV_DB_PATH) {
        tracing::info!("Using database path from {}", ENV_DB_PATH);
        config.storage.path = PathBuf::from(path);
    }

    if let Some(raw) = lookup(ENV_RETENTION_SECS) {
        match raw.parse::<u64>() {
            Ok(secs) => config.worker.retention = Duration::from_secs(secs),
            Err(e) => tracing::warn!(
                "Ignoring {}='{}': {}",
                ENV_RETENTION_SECS,
                raw,
                e
            ),
        }
    }
}

/// Load configuration from a TOML file, with environment variable overrides
pub fn load_config(config_path: impl AsRef<Path>) -> Result<Config> {
    let config_path = config_path.as_ref();
    let config_content = std::fs::read_to_string(config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        )
    })?;

    let mut config: Config = toml::from_str(&config_content).map_err(|e| {
        anyhow::anyhow!(
            "Failed to parse config file '{}': {}",
            config_path.display(),
            e
        )
    })?;

    apply_env_overrides(&mut config);
    config.validate()?;

    Ok(config)
}

/// Build configuration from defaults and environment variables only
pub fn load_config_from_env() -> Result<Config> {
    let mut config = Config::default();
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Load `config_path` if it exists, otherwise fall back to the environment
///
/// A file that exists but fails to parse is an error, not a fallback.
pub fn load_config_with_fallback(config_path: impl AsRef<Path>) -> Result<(Config, ConfigSource)> {
    let config_path = config_path.as_ref();
    if config_path.exists() {
        let config = load_config(config_path)?;
        return Ok((config, ConfigSource::File(config_path.to_path_buf())));
    }

    tracing::warn!(
        "Config file '{}' not found, using defaults and environment variables",
        config_path.display()
    );
    Ok((load_config_from_env()?, ConfigSource::Environment))
}

/// Default configuration, as used when no file is present
#[must_use]
pub fn create_default_config() -> Config {
    Config::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            lookup_from(&[
                (ENV_REDIS_URL, "redis://cache:6379/2"),
                (ENV_DB_PATH, "/var/lib/telemetry.db"),
                (ENV_RETENTION_SECS, "7200"),
            ]),
        );

        assert_eq!(config.queue.url, "redis://cache:6379/2");
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/telemetry.db"));
        assert_eq!(config.worker.retention, Duration::from_secs(7200));
    }

    #[test]
    fn test_bad_retention_override_ignored() {
        let mut config = Config::default();
        apply_overrides(&mut config, lookup_from(&[(ENV_RETENTION_SECS, "a day")]));
        assert_eq!(config.worker.retention, Config::default().worker.retention);
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let mut config = Config::default();
        apply_overrides(&mut config, lookup_from(&[]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_source_description() {
        assert_eq!(
            ConfigSource::File(PathBuf::from("worker.toml")).description(),
            "file 'worker.toml'"
        );
        assert!(ConfigSource::Environment.description().contains("environment"));
    }
}
