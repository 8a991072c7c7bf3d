//! SQLite backend.
//!
//! Concurrent appends are serialized by SQLite itself (WAL journal plus a busy
//! timeout); the store holds no application-level lock.

use super::{ObservationStore, ServiceRegistry, clamp_limit, format_timestamp, parse_timestamp};
use crate::types::{MonitoredService, NewObservation, Observation, ServiceDefinition, ServiceId};
use async_trait::async_trait;
use common::{Error, Result};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_CONNECTIONS: u32 = 8;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS services (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        target TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS observations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        service_id INTEGER NOT NULL,
        up INTEGER NOT NULL,
        checked_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_observations_service_checked
        ON observations (service_id, checked_at DESC)",
];

/// Store backed by a SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`, e.g. `sqlite://uptime.db`
    pub async fn connect(url: &str, max_connections: u32, busy_timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::config(format!("invalid database url {:?}: {}", url, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(Error::storage)?;

        info!(url, max_connections, "Opened SQLite store");
        Self::with_pool(pool).await
    }

    /// Open a database file with default pool settings
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(DEFAULT_BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(Error::storage)?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database.
    ///
    /// Pinned to one connection that never expires, because every SQLite
    /// memory connection is a separate database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(Error::storage)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(Error::storage)?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    async fn create_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(Error::storage)?;
        }
        debug!("Schema ready");
        Ok(())
    }

    /// Underlying pool, for maintenance queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn service_from_row(row: &SqliteRow) -> std::result::Result<MonitoredService, sqlx::Error> {
    Ok(MonitoredService {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: row.try_get("kind")?,
        target: row.try_get("target")?,
    })
}

fn observation_from_row(row: &SqliteRow) -> Result<Observation> {
    let checked_at: String = row.try_get("checked_at").map_err(Error::storage)?;

    Ok(Observation {
        id: row.try_get("id").map_err(Error::storage)?,
        service_id: row.try_get("service_id").map_err(Error::storage)?,
        up: row.try_get("up").map_err(Error::storage)?,
        checked_at: parse_timestamp(&checked_at)?,
    })
}

#[async_trait]
impl ServiceRegistry for SqliteStore {
    async fn list(&self) -> Result<Vec<MonitoredService>> {
        let rows = sqlx::query("SELECT id, name, kind, target FROM services ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::storage)?;

        rows.iter()
            .map(|row| service_from_row(row).map_err(Error::storage))
            .collect()
    }

    async fn insert(&self, service: ServiceDefinition) -> Result<ServiceId> {
        let result = sqlx::query("INSERT INTO services (name, kind, target) VALUES (?, ?, ?)")
            .bind(&service.name)
            .bind(service.kind.as_str())
            .bind(&service.target)
            .execute(&self.pool)
            .await
            .map_err(Error::storage)?;

        let id = result.last_insert_rowid();
        info!(id, name = %service.name, kind = %service.kind, target = %service.target, "Service registered");
        Ok(id)
    }

    async fn remove(&self, id: ServiceId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::storage)?;

        let purged = sqlx::query("DELETE FROM observations WHERE service_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?
            .rows_affected();

        let removed = sqlx::query("DELETE FROM services WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?
            .rows_affected();

        tx.commit().await.map_err(Error::storage)?;

        if removed > 0 {
            info!(id, purged, "Service removed");
        } else {
            debug!(id, "Remove of unknown service ignored");
        }
        Ok(())
    }
}

#[async_trait]
impl ObservationStore for SqliteStore {
    async fn append(&self, observation: NewObservation) -> Result<Option<Observation>> {
        // Guarded insert: a check finishing after its service was removed
        // must not leave an unreachable row behind.
        let result = sqlx::query(
            "INSERT INTO observations (service_id, up, checked_at)
             SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM services WHERE id = ?1)",
        )
        .bind(observation.service_id)
        .bind(observation.up)
        .bind(format_timestamp(&observation.checked_at))
        .execute(&self.pool)
        .await
        .map_err(Error::storage)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Observation {
            id: result.last_insert_rowid(),
            service_id: observation.service_id,
            up: observation.up,
            checked_at: observation.checked_at,
        }))
    }

    async fn recent_for(&self, service_id: ServiceId, limit: usize) -> Result<Vec<Observation>> {
        let rows = sqlx::query(
            "SELECT id, service_id, up, checked_at FROM observations
             WHERE service_id = ?
             ORDER BY checked_at DESC, id DESC
             LIMIT ?",
        )
        .bind(service_id)
        .bind(clamp_limit(limit) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::storage)?;

        rows.iter().map(observation_from_row).collect()
    }
}
