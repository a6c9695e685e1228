//! Record persistence.
//!
//! Three independent collections (tasks, notes, keywords) behind one
//! trait. Implementations:
//! - `SqliteStore`: on-disk store, one shared connection
//! - `MemoryStore`: in-process store with the same semantics
//!
//! Listing is always newest-first by `created_at`. Keywords are unique by
//! normalized key and saving an existing key replaces its value in place.

pub mod memory;
pub mod sqlite;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{KeywordRecord, NoteRecord, RecordKind, StoredRecord, TaskRecord};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors that can occur in a record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store operation cancelled before it started")]
    Cancelled,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence for tasks, notes and keywords
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save_task(&self, record: &TaskRecord) -> Result<(), StoreError>;

    async fn save_note(&self, record: &NoteRecord) -> Result<(), StoreError>;

    /// Insert or replace by normalized key, returning the surviving record.
    ///
    /// An existing key keeps its id and `created_at`; only the value and
    /// `updated_at` change.
    async fn save_keyword(&self, record: &KeywordRecord) -> Result<KeywordRecord, StoreError>;

    /// All records of one kind, newest first
    async fn list(&self, kind: RecordKind) -> Result<Vec<StoredRecord>, StoreError>;

    /// Remove one record. Tasks and notes match on id, keywords on the
    /// normalized key. Returns whether anything was removed.
    async fn delete(&self, kind: RecordKind, ident: &str) -> Result<bool, StoreError>;
}

/// Bound a store call by `limit`.
///
/// Dropping the call on expiry cancels it: [`SqliteStore`] skips a write
/// that has not taken the connection yet.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<(), StoreError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
