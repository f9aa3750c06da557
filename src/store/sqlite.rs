//! SQLite storage engine
//!
//! One connection behind a mutex; every call runs on tokio's blocking pool.
//! Inserts run row by row inside one transaction so a rejected row is
//! counted as failed without aborting its batch.

use super::{LeaseStore, LogStore, RawMetricStore, RollupStore};
use crate::error::StoreError;
use crate::types::{AggregatedMetric, InsertReport, MetricGroup, RawLogEntry, RawMetric, Window};
use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS raw_metrics (
        id INTEGER PRIMARY KEY,
        timestamp INTEGER NOT NULL,
        service TEXT NOT NULL,
        path TEXT NOT NULL,
        status_code INTEGER NOT NULL,
        latency_ms REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_raw_metrics_timestamp ON raw_metrics (timestamp);

    CREATE TABLE IF NOT EXISTS raw_logs (
        id INTEGER PRIMARY KEY,
        payload TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS aggregated_metrics (
        id INTEGER PRIMARY KEY,
        window_start INTEGER NOT NULL,
        window_end INTEGER NOT NULL,
        window_size TEXT NOT NULL,
        service TEXT NOT NULL CHECK (service <> ''),
        path TEXT NOT NULL,
        count INTEGER NOT NULL,
        error_count INTEGER NOT NULL,
        avg_latency_ms REAL NOT NULL,
        p95_latency_ms REAL NOT NULL,
        error_rate REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_aggregated_metrics_window
        ON aggregated_metrics (window_start, service, path);

    CREATE TABLE IF NOT EXISTS job_leases (
        name TEXT PRIMARY KEY,
        holder TEXT NOT NULL,
        expires_at_ms INTEGER NOT NULL
    );
";

/// SQLite-backed store for raw metrics, logs, rollups and job leases
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Self::with_schema(conn)
    }

    /// Private in-memory database, used by tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut conn)
        })
        .await?
    }

    /// Number of rollup rows, for diagnostics and tests
    pub async fn rollup_count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM aggregated_metrics", [], |row| {
                    row.get(0)
                })?;
            Ok(count as u64)
        })
        .await
    }

    /// Number of stored log documents
    pub async fn log_count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM raw_logs", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}

#[async_trait]
impl RawMetricStore for SqliteStore {
    async fn insert_metrics(&self, metrics: &[RawMetric]) -> Result<InsertReport, StoreError> {
        let metrics = metrics.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut report = InsertReport::default();
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO raw_metrics (timestamp, service, path, status_code, latency_ms)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for m in &metrics {
                    match stmt.execute(params![
                        m.timestamp,
                        m.service,
                        m.path,
                        m.status_code,
                        m.latency_ms
                    ]) {
                        Ok(_) => report.inserted += 1,
                        Err(e) => {
                            debug!("Rejected raw metric for {}{}: {}", m.service, m.path, e);
                            report.failed += 1;
                        }
                    }
                }
            }
            tx.commit()?;
            Ok(report)
        })
        .await
    }

    async fn group_window(&self, window: Window) -> Result<Vec<MetricGroup>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT timestamp, service, path, status_code, latency_ms
                 FROM raw_metrics
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 ORDER BY service, path, id",
            )?;
            let rows = stmt.query_map(params![window.start_ms, window.end_ms], |row| {
                Ok(RawMetric {
                    timestamp: row.get(0)?,
                    service: row.get(1)?,
                    path: row.get(2)?,
                    status_code: row.get(3)?,
                    latency_ms: row.get(4)?,
                })
            })?;
            let metrics = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(MetricGroup::group_in_window(&metrics, window))
        })
        .await
    }

    async fn delete_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM raw_metrics WHERE timestamp < ?1",
                params![cutoff_ms],
            )?;
            Ok(deleted as u64)
        })
        .await
    }
}

#[async_trait]
impl LogStore for SqliteStore {
    async fn insert_logs(&self, logs: &[RawLogEntry]) -> Result<InsertReport, StoreError> {
        let payloads: Vec<String> = logs
            .iter()
            .map(|entry| entry.payload().to_string())
            .collect();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut report = InsertReport::default();
            {
                let mut stmt = tx.prepare_cached("INSERT INTO raw_logs (payload) VALUES (?1)")?;
                for payload in &payloads {
                    match stmt.execute(params![payload]) {
                        Ok(_) => report.inserted += 1,
                        Err(e) => {
                            debug!("Rejected log document: {}", e);
                            report.failed += 1;
                        }
                    }
                }
            }
            tx.commit()?;
            Ok(report)
        })
        .await
    }
}

#[async_trait]
impl RollupStore for SqliteStore {
    async fn insert_rollups(
        &self,
        rollups: &[AggregatedMetric],
    ) -> Result<InsertReport, StoreError> {
        let rollups = rollups.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut report = InsertReport::default();
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO aggregated_metrics (
                        window_start, window_end, window_size, service, path, count,
                        error_count, avg_latency_ms, p95_latency_ms, error_rate
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )?;
                for r in &rollups {
                    match stmt.execute(params![
                        r.window_start,
                        r.window_end,
                        r.window_size,
                        r.service,
                        r.path,
                        r.count as i64,
                        r.error_count as i64,
                        r.avg_latency_ms,
                        r.p95_latency_ms,
                        r.error_rate
                    ]) {
                        Ok(_) => report.inserted += 1,
                        Err(e) => {
                            debug!("Rejected rollup for {}{}: {}", r.service, r.path, e);
                            report.failed += 1;
                        }
                    }
                }
            }
            tx.commit()?;
            Ok(report)
        })
        .await
    }
}

#[async_trait]
impl LeaseStore for SqliteStore {
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now_ms: i64,
        expires_at_ms: i64,
    ) -> Result<bool, StoreError> {
        let name = name.to_string();
        let holder = holder.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT INTO job_leases (name, holder, expires_at_ms) VALUES (?1, ?2, ?3)
                 ON CONFLICT (name) DO UPDATE
                    SET holder = excluded.holder, expires_at_ms = excluded.expires_at_ms
                    WHERE job_leases.holder = excluded.holder
                       OR job_leases.expires_at_ms <= ?4",
                params![name, holder, expires_at_ms, now_ms],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        let holder = holder.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM job_leases WHERE name = ?1 AND holder = ?2",
                params![name, holder],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(ts: i64, path: &str, status: u16, latency: f64) -> RawMetric {
        RawMetric {
            timestamp: ts,
            service: "lessons".to_string(),
            path: path.to_string(),
            status_code: status,
            latency_ms: latency,
        }
    }

    fn rollup(service: &str) -> AggregatedMetric {
        AggregatedMetric {
            window_start: 0,
            window_end: 60_000,
            window_size: "1m".to_string(),
            service: service.to_string(),
            path: "/".to_string(),
            count: 2,
            error_count: 1,
            avg_latency_ms: 20.0,
            p95_latency_ms: 30.0,
            error_rate: 50.0,
        }
    }

    #[tokio::test]
    async fn test_group_window_respects_half_open_bounds() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_metrics(&[
                metric(0, "/a", 200, 10.0),
                metric(59_999, "/a", 500, 30.0),
                metric(60_000, "/a", 200, 1.0),
                metric(1_000, "/b", 201, 4.0),
            ])
            .await
            .unwrap();

        let groups = store
            .group_window(Window {
                start_ms: 0,
                end_ms: 60_000,
            })
            .await
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].path, "/a");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].error_count, 1);
        assert_eq!(groups[0].latencies, vec![10.0, 30.0]);
        assert_eq!(groups[1].path, "/b");
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_metrics(&[metric(10, "/", 200, 1.0), metric(20, "/", 200, 1.0)])
            .await
            .unwrap();

        assert_eq!(store.delete_older_than(20).await.unwrap(), 1);
        assert_eq!(store.delete_older_than(20).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rollup_insert_is_unordered() {
        let store = SqliteStore::open_in_memory().unwrap();
        let report = store
            .insert_rollups(&[rollup("api"), rollup(""), rollup("web")])
            .await
            .unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(store.rollup_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_logs_stored_verbatim() {
        let store = SqliteStore::open_in_memory().unwrap();
        let entry = RawLogEntry(serde_json::json!({"level": "warn", "msg": "slow"}));
        let report = store.insert_logs(&[entry]).await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(store.log_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lease_upsert_semantics() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.try_acquire_lease("drain", "a", 0, 100).await.unwrap());
        assert!(!store.try_acquire_lease("drain", "b", 50, 150).await.unwrap());
        assert!(store.try_acquire_lease("drain", "a", 60, 160).await.unwrap());
        assert!(store.try_acquire_lease("drain", "b", 160, 260).await.unwrap());

        store.release_lease("drain", "a").await.unwrap();
        assert!(!store.try_acquire_lease("drain", "a", 170, 270).await.unwrap());
        store.release_lease("drain", "b").await.unwrap();
        assert!(store.try_acquire_lease("drain", "a", 170, 270).await.unwrap());
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert_metrics(&[metric(1, "/", 200, 1.0)])
                .await
                .unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        let groups = reopened
            .group_window(Window {
                start_ms: 0,
                end_ms: 10,
            })
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
    }
}
