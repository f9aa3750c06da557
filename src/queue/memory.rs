//! In-process queue with the same list semantics as the Redis client

use super::FastQueue;
use crate::error::QueueError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lists keyed by name; clones share the same lists
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    lists: Arc<DashMap<String, VecDeque<String>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `QueueError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of entries waiting in `list`
    #[must_use]
    pub fn len(&self, list: &str) -> usize {
        self.lists.get(list).map_or(0, |entries| entries.len())
    }

    #[must_use]
    pub fn is_empty(&self, list: &str) -> bool {
        self.len(list) == 0
    }

    /// Push many entries at once
    pub fn extend<I>(&self, list: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.lists
            .entry(list.to_string())
            .or_default()
            .extend(entries);
    }

    fn check_available(&self) -> Result<(), QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(QueueError::Unavailable("memory queue offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FastQueue for MemoryQueue {
    async fn pop_batch(&self, list: &str, max: usize) -> Result<Vec<String>, QueueError> {
        self.check_available()?;
        let Some(mut entries) = self.lists.get_mut(list) else {
            return Ok(Vec::new());
        };
        let take = max.min(entries.len());
        Ok(entries.drain(..take).collect())
    }

    async fn push(&self, list: &str, entry: String) -> Result<(), QueueError> {
        self.check_available()?;
        self.lists
            .entry(list.to_string())
            .or_default()
            .push_back(entry);
        Ok(())
    }
}
