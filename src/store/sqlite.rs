//! SQLite record store.
//!
//! One connection is opened at startup and shared behind a mutex; every
//! call runs on the blocking pool. Timestamps are stored as fixed-width
//! RFC 3339 UTC strings so text order equals time order.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};

use super::{RecordStore, StoreError};
use crate::domain::{
    normalize_key, KeywordRecord, NoteRecord, Priority, RecordKind, StoredRecord, TaskRecord,
};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id          TEXT PRIMARY KEY,
    text        TEXT NOT NULL,
    priority    TEXT NOT NULL,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);

CREATE TABLE IF NOT EXISTS notes (
    id          TEXT PRIMARY KEY,
    text        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes(created_at);

CREATE TABLE IF NOT EXISTS keywords (
    id          TEXT PRIMARY KEY,
    key         TEXT NOT NULL UNIQUE,
    value       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_keywords_created_at ON keywords(created_at);
";

/// SQLite-backed [`RecordStore`]
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let started_at = Instant::now();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self::bootstrap(conn)?;

        tracing::info!(
            path = %path.display(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Record store opened"
        );
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(StoreError::InvalidData(format!(
                "database schema version {} is newer than supported {}",
                version, SCHEMA_VERSION
            )));
        }
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// If the caller drops this future before `f` gets the connection,
    /// `f` never runs.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let cancel = CancelOnDrop::default();
        let cancelled = Arc::clone(&cancel.0);

        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            if cancelled.load(Ordering::Acquire) {
                tracing::warn!("Store call abandoned by caller, skipping");
                return Err(StoreError::Cancelled);
            }
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

/// Raises its flag when the owning future is dropped
#[derive(Default)]
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn save_task(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, text, priority, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.text,
                    record.priority.as_str(),
                    record.status.as_str(),
                    format_timestamp(record.created_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn save_note(&self, record: &NoteRecord) -> Result<(), StoreError> {
        let record = record.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO notes (id, text, created_at) VALUES (?1, ?2, ?3)",
                params![record.id, record.text, format_timestamp(record.created_at)],
            )?;
            Ok(())
        })
        .await
    }

    async fn save_keyword(&self, record: &KeywordRecord) -> Result<KeywordRecord, StoreError> {
        let record = record.clone();
        self.run(move |conn| {
            let raw = conn.query_row(
                "INSERT INTO keywords (id, key, value, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                 RETURNING id, key, value, created_at, updated_at",
                params![
                    record.id,
                    normalize_key(&record.key),
                    record.value,
                    format_timestamp(record.created_at),
                    format_timestamp(record.updated_at),
                ],
                keyword_columns,
            )?;
            keyword_from_columns(raw)
        })
        .await
    }

    async fn list(&self, kind: RecordKind) -> Result<Vec<StoredRecord>, StoreError> {
        self.run(move |conn| match kind {
            RecordKind::Task => {
                let mut stmt = conn.prepare(
                    "SELECT id, text, priority, status, created_at FROM tasks
                     ORDER BY created_at DESC, rowid DESC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?;

                let mut records = Vec::new();
                for row in rows {
                    let (id, text, priority, status, created_at) = row?;
                    records.push(StoredRecord::Task(TaskRecord {
                        id,
                        text,
                        priority: Priority::from(priority),
                        status: status.parse().map_err(StoreError::InvalidData)?,
                        created_at: parse_timestamp(&created_at)?,
                    }));
                }
                Ok(records)
            }
            RecordKind::Note => {
                let mut stmt = conn.prepare(
                    "SELECT id, text, created_at FROM notes
                     ORDER BY created_at DESC, rowid DESC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?;

                let mut records = Vec::new();
                for row in rows {
                    let (id, text, created_at) = row?;
                    records.push(StoredRecord::Note(NoteRecord {
                        id,
                        text,
                        created_at: parse_timestamp(&created_at)?,
                    }));
                }
                Ok(records)
            }
            RecordKind::Keyword => {
                let mut stmt = conn.prepare(
                    "SELECT id, key, value, created_at, updated_at FROM keywords
                     ORDER BY created_at DESC, rowid DESC",
                )?;
                let rows = stmt.query_map([], keyword_columns)?;

                let mut records = Vec::new();
                for row in rows {
                    records.push(StoredRecord::Keyword(keyword_from_columns(row?)?));
                }
                Ok(records)
            }
        })
        .await
    }

    async fn delete(&self, kind: RecordKind, ident: &str) -> Result<bool, StoreError> {
        let ident = match kind {
            RecordKind::Keyword => normalize_key(ident),
            RecordKind::Task | RecordKind::Note => ident.to_string(),
        };

        self.run(move |conn| {
            let sql = match kind {
                RecordKind::Task => "DELETE FROM tasks WHERE id = ?1",
                RecordKind::Note => "DELETE FROM notes WHERE id = ?1",
                RecordKind::Keyword => "DELETE FROM keywords WHERE key = ?1",
            };
            let removed = conn.execute(sql, params![ident])?;
            Ok(removed > 0)
        })
        .await
    }
}

type KeywordColumns = (String, String, String, String, String);

fn keyword_columns(row: &Row<'_>) -> rusqlite::Result<KeywordColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn keyword_from_columns(
    (id, key, value, created_at, updated_at): KeywordColumns,
) -> Result<KeywordRecord, StoreError> {
    Ok(KeywordRecord {
        id,
        key,
        value,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::with_timeout;

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let earlier = parse_timestamp("2024-01-01T09:00:00.000001Z").unwrap();
        let later = parse_timestamp("2024-01-01T10:00:00Z").unwrap();

        assert!(format_timestamp(earlier) < format_timestamp(later));
        assert_eq!(format_timestamp(earlier), "2024-01-01T09:00:00.000001Z");
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .run(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_timed_out_write_is_not_committed() {
        let store = SqliteStore::open_in_memory().unwrap();

        let conn = Arc::clone(&store.conn);
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            let _guard = conn.lock().unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(300));
        });
        locked_rx.recv().unwrap();

        let task = TaskRecord::new("Buy milk", Priority::High);
        let result = with_timeout(Duration::from_millis(50), store.save_task(&task)).await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));

        holder.join().unwrap();
        let tasks = store.list(RecordKind::Task).await.unwrap();
        assert!(tasks.is_empty(), "abandoned write was committed: {:?}", tasks);
    }
}
