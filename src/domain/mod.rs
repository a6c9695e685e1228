//! Domain types for the intake pipeline.
//!
//! This module contains the core data structures:
//! - Command: the normalized inbound request
//! - ParsedIntent: the classifier's structured output
//! - Records: persisted tasks, notes and keywords
//! - ResponseEnvelope: the uniform response shape

pub mod command;
pub mod envelope;
pub mod intent;
pub mod record;

// Re-export commonly used types
pub use command::{Command, CommandInput, CommandKind, DEFAULT_AUDIO_MEDIA_TYPE, DEFAULT_TIMEZONE};
pub use envelope::{ErrorDetail, ResponseEnvelope, ResponseKind};
pub use intent::{
    ParsedIntent, Priority, DEFAULT_MEETING_MINUTES, UNKNOWN_DESTINATION, UNTITLED_TASK,
};
pub use record::{
    normalize_key, KeywordRecord, NoteRecord, RecordKind, StoredRecord, TaskRecord, TaskStatus,
};
