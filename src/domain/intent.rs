//! Classified intents.
//!
//! The classifier's structured output is a closed set of four intents. The
//! serialized form uses an `intent` tag matching the taxonomy the model is
//! prompted with (`TODO`, `MEETING`, `NOTE`, `TRANSPORT`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default meeting length when the model gives none
pub const DEFAULT_MEETING_MINUTES: u32 = 60;

/// Title used when a task arrives without one
pub const UNTITLED_TASK: &str = "Untitled Task";

/// Destination used when a transport query names none
pub const UNKNOWN_DESTINATION: &str = "Unknown";

/// The classified purpose of an utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent")]
pub enum ParsedIntent {
    #[serde(rename = "TODO")]
    Task { title: String, priority: Priority },

    #[serde(rename = "MEETING")]
    Meeting {
        title: String,
        /// ISO-8601 start, as produced by the model
        #[serde(rename = "datetime")]
        start_time: String,
        #[serde(rename = "duration")]
        duration_minutes: u32,
    },

    #[serde(rename = "NOTE")]
    Note { title: String },

    #[serde(rename = "TRANSPORT")]
    Transport { destination: String },
}

impl ParsedIntent {
    /// Fallback used when the model output cannot be read as JSON
    pub fn fallback(text: &str) -> Self {
        ParsedIntent::Task {
            title: text.to_string(),
            priority: Priority::Medium,
        }
    }

    /// Build an intent from the model's JSON object.
    ///
    /// Tags are matched case-insensitively. Anything that is not
    /// MEETING, NOTE or TRANSPORT is treated as a task, including a missing
    /// tag: when in doubt the request is kept as something to do.
    pub fn from_model_json(value: &Value) -> Self {
        let tag = str_field(value, "intent")
            .map(|s| s.trim().to_ascii_uppercase())
            .unwrap_or_default();

        match tag.as_str() {
            "MEETING" => ParsedIntent::Meeting {
                title: str_field(value, "title")
                    .unwrap_or("Meeting")
                    .to_string(),
                start_time: str_field(value, "datetime")
                    .unwrap_or_default()
                    .to_string(),
                duration_minutes: duration_field(value.get("duration"))
                    .unwrap_or(DEFAULT_MEETING_MINUTES),
            },
            "NOTE" => ParsedIntent::Note {
                title: str_field(value, "title").unwrap_or_default().to_string(),
            },
            "TRANSPORT" => ParsedIntent::Transport {
                destination: str_field(value, "destination")
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or(UNKNOWN_DESTINATION)
                    .to_string(),
            },
            _ => ParsedIntent::Task {
                title: str_field(value, "title")
                    .unwrap_or(UNTITLED_TASK)
                    .to_string(),
                priority: str_field(value, "priority")
                    .map(Priority::from)
                    .unwrap_or_default(),
            },
        }
    }

    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            ParsedIntent::Task { .. } => "TODO",
            ParsedIntent::Meeting { .. } => "MEETING",
            ParsedIntent::Note { .. } => "NOTE",
            ParsedIntent::Transport { .. } => "TRANSPORT",
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn duration_field(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Task priority.
///
/// Values outside low/medium/high are kept verbatim rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Other(String),
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Other(s) => s,
        }
    }
}

impl From<&str> for Priority {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Priority::Low,
            "medium" | "" => Priority::Medium,
            "high" => Priority::High,
            _ => Priority::Other(s.to_string()),
        }
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        Priority::from(s.as_str())
    }
}

impl From<Priority> for String {
    fn from(p: Priority) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
