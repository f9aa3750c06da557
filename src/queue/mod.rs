//! Fast queue clients
//!
//! Producers elsewhere push serialized log and metric entries onto two named
//! lists; the drain job pops them in batches.

mod memory;
mod redis_queue;

pub use memory::MemoryQueue;
pub use redis_queue::RedisQueue;

use crate::error::QueueError;
use async_trait::async_trait;

/// A list-oriented fast queue
#[async_trait]
pub trait FastQueue: Send + Sync + std::fmt::Debug {
    /// Pop up to `max` entries from the head of `list`, oldest first
    ///
    /// An empty or missing list yields an empty vector.
    async fn pop_batch(&self, list: &str, max: usize) -> Result<Vec<String>, QueueError>;

    /// Append one serialized entry to the tail of `list`
    async fn push(&self, list: &str, entry: String) -> Result<(), QueueError>;
}
