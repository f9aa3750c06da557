//! Redis-backed fast queue
//!
//! Lists are plain Redis lists: producers `RPUSH`, the drain job pops with
//! `LPOP key count` (Redis >= 6.2), so a batch is taken atomically.

use super::FastQueue;
use crate::error::QueueError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::info;

/// Queue client over one multiplexed Redis connection
#[derive(Clone)]
pub struct RedisQueue {
    conn: MultiplexedConnection,
    endpoint: String,
}

impl RedisQueue {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`)
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        let endpoint = redact_url(url);
        info!("Connected to Redis at {}", endpoint);
        Ok(Self { conn, endpoint })
    }
}

impl std::fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisQueue")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FastQueue for RedisQueue {
    async fn pop_batch(&self, list: &str, max: usize) -> Result<Vec<String>, QueueError> {
        let mut conn = self.conn.clone();
        let entries: Option<Vec<String>> = redis::cmd("LPOP")
            .arg(list)
            .arg(max)
            .query_async(&mut conn)
            .await?;
        Ok(entries.unwrap_or_default())
    }

    async fn push(&self, list: &str, entry: String) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _len: i64 = redis::cmd("RPUSH")
            .arg(list)
            .arg(entry)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

/// Strip credentials from a connection URL before it reaches the logs
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
