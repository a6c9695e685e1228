//! Persisted record types.
//!
//! Records are created by the caller (id and timestamp assigned at
//! construction) and handed to a [`crate::store::RecordStore`]. Ids and
//! creation times never change after that.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Priority;

/// The three collections a store holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Task,
    Note,
    Keyword,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Task => "task",
            RecordKind::Note => "note",
            RecordKind::Keyword => "keyword",
        }
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" | "tasks" | "todo" | "todos" => Ok(RecordKind::Task),
            "note" | "notes" => Ok(RecordKind::Note),
            "keyword" | "keywords" => Ok(RecordKind::Keyword),
            other => Err(format!(
                "Unknown record type: {}. Expected: task, note, or keyword",
                other
            )),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            other => Err(format!("Unknown task status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub text: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(text: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl NoteRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// A user-defined text substitution, unique by normalized key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub id: String,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KeywordRecord {
    /// New keyword; the key is normalized on construction
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            key: normalize_key(key),
            value: value.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Keyword keys are compared trimmed and lowercased
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Any stored record, serialized as its flat document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StoredRecord {
    Task(TaskRecord),
    Note(NoteRecord),
    Keyword(KeywordRecord),
}

impl StoredRecord {
    pub fn id(&self) -> &str {
        match self {
            StoredRecord::Task(r) => &r.id,
            StoredRecord::Note(r) => &r.id,
            StoredRecord::Keyword(r) => &r.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            StoredRecord::Task(r) => r.created_at,
            StoredRecord::Note(r) => r.created_at,
            StoredRecord::Keyword(r) => r.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_aliases() {
        assert_eq!("todo".parse::<RecordKind>().unwrap(), RecordKind::Task);
        assert_eq!("Notes".parse::<RecordKind>().unwrap(), RecordKind::Note);
        assert_eq!("keyword".parse::<RecordKind>().unwrap(), RecordKind::Keyword);
        assert!("meeting".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_keyword_key_normalized() {
        let record = KeywordRecord::new("  Home ", "1600 Amphitheatre Parkway");
        assert_eq!(record.key, "home");
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_task_document_shape() {
        let record = TaskRecord::new("Buy milk", Priority::High);
        let value = serde_json::to_value(StoredRecord::Task(record.clone())).unwrap();

        assert_eq!(value["text"], "Buy milk");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["id"], record.id.as_str());
        assert!(value.get("created_at").is_some());
    }
}
