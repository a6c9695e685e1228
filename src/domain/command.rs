//! Canonical command produced by request normalization.

use serde::Serialize;

/// Timezone assumed when the caller does not send one
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Media type assumed for embedded audio without a declared type
pub const DEFAULT_AUDIO_MEDIA_TYPE: &str = "audio/wav";

/// Input carried by a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandInput {
    /// A text transcript
    Text(String),

    /// Raw audio awaiting transcription
    Audio { bytes: Vec<u8>, media_type: String },
}

/// Discriminant of [`CommandInput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    Text,
    Audio,
}

/// A decoded inbound request, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub input: CommandInput,
    pub timezone: String,
    pub reply_email: Option<String>,
}

impl Command {
    pub fn text(transcript: impl Into<String>) -> Self {
        Self {
            input: CommandInput::Text(transcript.into()),
            timezone: DEFAULT_TIMEZONE.to_string(),
            reply_email: None,
        }
    }

    pub fn audio(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            input: CommandInput::Audio {
                bytes,
                media_type: media_type.into(),
            },
            timezone: DEFAULT_TIMEZONE.to_string(),
            reply_email: None,
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_reply_email(mut self, email: Option<String>) -> Self {
        self.reply_email = email;
        self
    }

    pub fn kind(&self) -> CommandKind {
        match self.input {
            CommandInput::Text(_) => CommandKind::Text,
            CommandInput::Audio { .. } => CommandKind::Audio,
        }
    }
}
