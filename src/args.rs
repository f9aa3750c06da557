//! Command-line arguments for the worker binary

use crate::types::ThreadCount;
use clap::Parser;
use std::path::PathBuf;

/// Telemetry aggregation worker
///
/// Drains raw logs and metrics from Redis into SQLite, writes per-minute
/// rollups and prunes expired raw metrics.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    ///
    /// Falls back to defaults plus environment variables when the file is missing.
    #[arg(short, long, default_value = "config.toml", env = "TELEMETRY_CONFIG")]
    pub config: PathBuf,

    /// Also write logs to this file
    #[arg(long, env = "TELEMETRY_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Number of runtime threads (default: 1)
    #[arg(short, long, env = "TELEMETRY_THREADS")]
    pub threads: Option<ThreadCount>,
}
