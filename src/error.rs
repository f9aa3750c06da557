//! Error types for the telemetry worker
//!
//! Library code returns these typed errors; the binary and config loaders
//! wrap them in `anyhow` at the edge.

use thiserror::Error;

/// Errors raised by durable storage backends
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// SQLite reported an error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A blocking storage task panicked or was cancelled
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The backend is temporarily unavailable
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by fast queue clients
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the worker control surface
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkerError {
    /// `start()` was called after `stop()`
    #[error("worker shutdown already requested")]
    ShutdownRequested,

    /// `start()` was called twice
    #[error("worker already started")]
    AlreadyStarted,

    /// Shared dependencies could not be resolved
    #[error("failed to resolve dependencies: {0}")]
    Dependency(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unavailable("disk full".to_string());
        assert_eq!(err.to_string(), "store unavailable: disk full");
    }

    #[test]
    fn test_worker_error_from_store_error() {
        let err: WorkerError = StoreError::Unavailable("down".to_string()).into();
        assert!(matches!(err, WorkerError::Store(_)));
        assert_eq!(err.to_string(), "store unavailable: down");
    }

    #[test]
    fn test_shutdown_requested_display() {
        assert_eq!(
            WorkerError::ShutdownRequested.to_string(),
            "worker shutdown already requested"
        );
    }
}
