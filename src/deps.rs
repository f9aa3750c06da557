//! Resolve-once shared dependencies
//!
//! The drain job needs a fast queue client and a log sink. Hosts either hand
//! both over at boot ([`SharedDependencies::resolved`]) or supply a
//! [`DependencyResolver`] that is called on first use. Concurrent first
//! callers all await the same resolution; a failed resolution is retried by
//! the next caller.

use crate::error::WorkerError;
use crate::queue::FastQueue;
use crate::store::LogStore;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// The fast queue client and the durable log sink
#[derive(Debug, Clone)]
pub struct Dependencies {
    pub queue: Arc<dyn FastQueue>,
    pub log_sink: Arc<dyn LogStore>,
}

/// Produces [`Dependencies`] on demand
#[async_trait]
pub trait DependencyResolver: Send + Sync + std::fmt::Debug {
    async fn resolve(&self) -> Result<Dependencies, WorkerError>;
}

/// Memoized dependencies shared by every job
#[derive(Debug)]
pub struct SharedDependencies {
    cell: OnceCell<Dependencies>,
    resolver: Option<Arc<dyn DependencyResolver>>,
}

impl SharedDependencies {
    /// Dependencies already resolved by the caller
    pub fn resolved(queue: Arc<dyn FastQueue>, log_sink: Arc<dyn LogStore>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(Dependencies { queue, log_sink })),
            resolver: None,
        }
    }

    /// Dependencies resolved on first use
    pub fn lazy(resolver: Arc<dyn DependencyResolver>) -> Self {
        Self {
            cell: OnceCell::new(),
            resolver: Some(resolver),
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.cell.initialized()
    }

    /// Resolve (at most once) and return the dependencies
    pub async fn get(&self) -> Result<Dependencies, WorkerError> {
        self.cell
            .get_or_try_init(|| async {
                match &self.resolver {
                    Some(resolver) => resolver.resolve().await,
                    None => Err(WorkerError::Dependency(
                        "no dependency resolver configured".to_string(),
                    )),
                }
            })
            .await
            .cloned()
    }
}
