//! In-process record store, used by `--memory` runs and tests.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{RecordStore, StoreError};
use crate::domain::{
    normalize_key, KeywordRecord, NoteRecord, RecordKind, StoredRecord, TaskRecord,
};

#[derive(Debug, Default)]
struct Collections {
    tasks: Vec<TaskRecord>,
    notes: Vec<NoteRecord>,
    keywords: Vec<KeywordRecord>,
}

/// [`RecordStore`] held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

/// Newest first; equal timestamps keep the latest insertion first
fn newest_first(mut records: Vec<StoredRecord>) -> Vec<StoredRecord> {
    records.reverse();
    records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    records
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save_task(&self, record: &TaskRecord) -> Result<(), StoreError> {
        self.lock()?.tasks.push(record.clone());
        Ok(())
    }

    async fn save_note(&self, record: &NoteRecord) -> Result<(), StoreError> {
        self.lock()?.notes.push(record.clone());
        Ok(())
    }

    async fn save_keyword(&self, record: &KeywordRecord) -> Result<KeywordRecord, StoreError> {
        let key = normalize_key(&record.key);
        let mut collections = self.lock()?;

        if let Some(existing) = collections.keywords.iter_mut().find(|k| k.key == key) {
            existing.value = record.value.clone();
            existing.updated_at = record.updated_at;
            return Ok(existing.clone());
        }

        let stored = KeywordRecord {
            key,
            ..record.clone()
        };
        collections.keywords.push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, kind: RecordKind) -> Result<Vec<StoredRecord>, StoreError> {
        let collections = self.lock()?;
        let records = match kind {
            RecordKind::Task => collections
                .tasks
                .iter()
                .cloned()
                .map(StoredRecord::Task)
                .collect(),
            RecordKind::Note => collections
                .notes
                .iter()
                .cloned()
                .map(StoredRecord::Note)
                .collect(),
            RecordKind::Keyword => collections
                .keywords
                .iter()
                .cloned()
                .map(StoredRecord::Keyword)
                .collect(),
        };
        Ok(newest_first(records))
    }

    async fn delete(&self, kind: RecordKind, ident: &str) -> Result<bool, StoreError> {
        let mut collections = self.lock()?;
        let removed = match kind {
            RecordKind::Task => {
                let before = collections.tasks.len();
                collections.tasks.retain(|r| r.id != ident);
                before != collections.tasks.len()
            }
            RecordKind::Note => {
                let before = collections.notes.len();
                collections.notes.retain(|r| r.id != ident);
                before != collections.notes.len()
            }
            RecordKind::Keyword => {
                let key = normalize_key(ident);
                let before = collections.keywords.len();
                collections.keywords.retain(|r| r.key != key);
                before != collections.keywords.len()
            }
        };
        Ok(removed)
    }
}
