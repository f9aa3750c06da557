//! Batch, chunk and thread limits

use crate::constants::{drain, write};
use std::num::NonZeroUsize;

nonzero_newtype! {
    /// A non-zero number of entries popped from one queue list per tick
    ///
    /// # Examples
    /// ```
    /// use telemetry_worker::types::BatchSize;
    ///
    /// let batch = BatchSize::new(100).unwrap();
    /// assert_eq!(batch.get(), 100);
    ///
    /// // An empty batch would never make progress
    /// assert!(BatchSize::new(0).is_none());
    /// ```
    #[doc(alias = "batch")]
    pub struct BatchSize(NonZeroUsize: usize, serialize as serialize_u64);
}

impl BatchSize {
    /// Default batch size for both the log and metric lists
    pub const DEFAULT: Self = Self(NonZeroUsize::new(drain::LOG_BATCH_SIZE).unwrap());
}

impl Default for BatchSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

nonzero_newtype! {
    /// A non-zero number of documents written per bulk insert
    ///
    /// Also reused as the "yield every N documents" cadence.
    pub struct ChunkSize(NonZeroUsize: usize, serialize as serialize_u64);
}

impl ChunkSize {
    /// Default bulk insert chunk
    pub const DEFAULT: Self = Self(NonZeroUsize::new(write::CHUNK_SIZE).unwrap());

    /// Default cadence for yielding while building documents
    pub const YIELD_DEFAULT: Self = Self(NonZeroUsize::new(write::YIELD_EVERY).unwrap());
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

nonzero_newtype! {
    /// A non-zero thread count
    ///
    /// Ensures thread pools always have at least 1 thread.
    pub struct ThreadCount(NonZeroUsize: usize, serialize as serialize_u64);
}

impl ThreadCount {
    /// Default thread count; the worker is a single event loop
    pub const DEFAULT: Self = Self(NonZeroUsize::new(1).unwrap());
}

impl Default for ThreadCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::str::FromStr for ThreadCount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.parse::<usize>()?;
        Ok(Self::new(value).unwrap_or(Self::DEFAULT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_rejects_zero() {
        assert!(BatchSize::new(0).is_none());
        assert_eq!(BatchSize::new(7).map(|b| b.get()), Some(7));
    }

    #[test]
    fn test_chunk_size_defaults() {
        assert_eq!(ChunkSize::default().get(), 50);
        assert_eq!(ChunkSize::YIELD_DEFAULT.get(), 20);
    }

    #[test]
    fn test_thread_count_from_str_zero_falls_back() {
        let threads: ThreadCount = "0".parse().unwrap();
        assert_eq!(threads, ThreadCount::DEFAULT);
        let threads: ThreadCount = "4".parse().unwrap();
        assert_eq!(threads.get(), 4);
    }

    #[test]
    fn test_batch_size_deserialize_zero_fails() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[allow(dead_code)]
            size: BatchSize,
        }
        let result: Result<Wrapper, _> = toml::from_str("size = 0");
        assert!(result.is_err());
        let ok: Wrapper = toml::from_str("size = 25").unwrap();
        assert_eq!(ok.size.get(), 25);
    }
}
