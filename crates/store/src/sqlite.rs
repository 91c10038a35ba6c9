//! SQLite event store.
//!
//! One table, `events`, holding the same flat record the JSON file uses;
//! `extra` is stored as a JSON string. Insertion order is kept in `seq`
//! because ids may be reused under the max-plus-one policy.
//!
//! A `meta` table keeps the high-water mark for the monotonic id policy.

use async_trait::async_trait;
use medtriage_config::IdPolicy;
use medtriage_core::error::StoreError;
use medtriage_core::event::{Event, EventBody, EventId};
use medtriage_core::store::EventStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::id_space_exhausted;

/// A SQLite-backed event store.
pub struct SqliteEventStore {
    pool: SqlitePool,
    policy: IdPolicy,
    // Serializes id assignment across the pool's connections
    write_lock: Mutex<()>,
}

impl SqliteEventStore {
    /// Open (or create) the database at `path`.
    pub async fn open(path: &Path, policy: IdPolicy) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Storage(format!("Failed to create data directory: {e}"))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self {
            pool,
            policy,
            write_lock: Mutex::new(()),
        };
        store.run_migrations().await?;
        info!(path = %path.display(), ?policy, "SQLite event store initialized");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id         INTEGER PRIMARY KEY,
                kind       TEXT NOT NULL,
                text       TEXT NOT NULL,
                timestamp  TEXT NOT NULL,
                extra      TEXT NOT NULL DEFAULT '{}',
                seq        INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("events table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_seq ON events(seq)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("seq index: {e}")))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value INTEGER NOT NULL)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("meta table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Rebuild an `Event` from a row by reassembling its wire record.
    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<Event, StoreError> {
        let column = |name: &str, e: sqlx::Error| StoreError::Corrupted(format!("{name} column: {e}"));

        let id: i64 = row.try_get("id").map_err(|e| column("id", e))?;
        let kind: String = row.try_get("kind").map_err(|e| column("kind", e))?;
        let text: String = row.try_get("text").map_err(|e| column("text", e))?;
        let timestamp: String = row.try_get("timestamp").map_err(|e| column("timestamp", e))?;
        let extra: String = row.try_get("extra").map_err(|e| column("extra", e))?;

        let extra: serde_json::Value = serde_json::from_str(&extra)
            .map_err(|e| StoreError::Corrupted(format!("event {id} extra: {e}")))?;

        serde_json::from_value(serde_json::json!({
            "id": id,
            "kind": kind,
            "text": text,
            "timestamp": timestamp,
            "extra": extra,
        }))
        .map_err(|e| StoreError::Corrupted(format!("event {id}: {e}")))
    }
}

fn query_err(e: sqlx::Error) -> StoreError {
    StoreError::Storage(format!("SQLite query failed: {e}"))
}

#[async_trait]
impl EventStore for SqliteEventStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, text: String, body: EventBody) -> Result<Event, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(query_err)?;

        let max_id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM events")
            .fetch_one(&mut *tx)
            .await
            .map_err(query_err)?;
        let counter: Option<i64> =
            sqlx::query_scalar("SELECT value FROM meta WHERE key = 'next_id'")
                .fetch_optional(&mut *tx)
                .await
                .map_err(query_err)?;
        let max_plus_one = max_id.checked_add(1).ok_or_else(id_space_exhausted)?;
        let id = match self.policy {
            IdPolicy::MaxPlusOne => max_plus_one,
            IdPolicy::Monotonic => max_plus_one.max(counter.unwrap_or(0)),
        };

        let event = Event::new(id as EventId, text, body);
        let wire = serde_json::to_value(&event)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize event: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO events (id, kind, text, timestamp, extra, seq)
            VALUES (?1, ?2, ?3, ?4, ?5, (SELECT COALESCE(MAX(seq), 0) + 1 FROM events))
            "#,
        )
        .bind(id)
        .bind(event.kind().as_str())
        .bind(&event.text)
        .bind(event.timestamp_iso())
        .bind(wire["extra"].to_string())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        if self.policy == IdPolicy::Monotonic {
            sqlx::query(
                "INSERT INTO meta (key, value) VALUES ('next_id', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(id.saturating_add(1))
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }

        tx.commit().await.map_err(query_err)?;
        debug!(id, kind = %event.kind(), "Event appended");
        Ok(event)
    }

    async fn all(&self) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query("SELECT id, kind, text, timestamp, extra FROM events ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;
        rows.iter().map(Self::row_to_event).collect()
    }

    async fn delete(&self, id: EventId) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM events WHERE id = ?1")
            .bind(id as i64)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected() as usize)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(count as usize)
    }
}
