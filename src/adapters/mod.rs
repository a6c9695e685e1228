//! Adapter interfaces for external services.
//!
//! Each external collaborator sits behind a trait so the pipeline can be
//! driven with real HTTP clients in production and stubs in tests:
//! - `Transcriber`: speech-to-text
//! - `IntentClassifier`: natural-language intent extraction
//! - `InviteSender`: meeting invite delivery (mocked)

pub mod classifier;
pub mod invite;
pub mod transcription;

// Re-export the adapter surface
pub use classifier::{
    build_system_prompt, parse_model_content, ChatClassifier, ClassifierError, IntentClassifier,
};
pub use invite::{InviteError, InviteSender, MeetingInvite, MockInviteSender, SentInvite};
pub use transcription::{
    extension_for_media_type, Transcriber, TranscriptionError, WhisperTranscriber,
};

/// Longest prefix of upstream text written to logs
const LOG_PREVIEW_CHARS: usize = 200;

/// Bounded, single-line preview of upstream text for logging
pub fn log_preview(text: &str) -> String {
    let flat: String = text
        .trim()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let total = flat.chars().count();
    if total > LOG_PREVIEW_CHARS {
        let head: String = flat.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{}... ({} chars total)", head, total)
    } else {
        flat
    }
}
