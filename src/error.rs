//! Error taxonomy for the intake pipeline.
//!
//! Every failure that can reach a caller is one of these variants. The
//! dispatcher converts them into error envelopes at the outermost boundary;
//! adapter-level errors convert in via `From`.

use thiserror::Error;

use crate::adapters::{ClassifierError, InviteError, TranscriptionError};
use crate::store::StoreError;

/// Errors surfaced by the intake pipeline
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Invalid request: {0}")]
    MalformedRequest(String),

    #[error("Missing transcript")]
    MissingTranscript,

    #[error("Missing audio data")]
    MissingAudio,

    #[error("Recipient email not configured")]
    RecipientNotConfigured,

    #[error("{service} API key not configured")]
    ServiceUnauthenticated { service: &'static str },

    #[error("Failed to contact AI service: {0}")]
    ClassificationUnavailable(String),

    #[error("Upstream service returned {status}")]
    UpstreamError { status: u16, body: String },

    #[error("Upstream service failed: {0}")]
    UpstreamUnexpected(String),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("Failed to send invite: {0}")]
    NotificationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    UnsupportedMethod(String),
}

impl IntakeError {
    /// Transport status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            IntakeError::MalformedRequest(_)
            | IntakeError::MissingTranscript
            | IntakeError::MissingAudio => 400,
            IntakeError::NotFound(_) => 404,
            IntakeError::UnsupportedMethod(_) => 405,
            IntakeError::RecipientNotConfigured
            | IntakeError::ServiceUnauthenticated { .. }
            | IntakeError::ClassificationUnavailable(_)
            | IntakeError::UpstreamError { .. }
            | IntakeError::UpstreamUnexpected(_)
            | IntakeError::Persistence(_)
            | IntakeError::NotificationFailed(_) => 500,
        }
    }

    /// Stable machine-readable code carried in error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::MalformedRequest(_) => "MALFORMED_REQUEST",
            IntakeError::MissingTranscript => "MISSING_TRANSCRIPT",
            IntakeError::MissingAudio => "MISSING_AUDIO",
            IntakeError::RecipientNotConfigured => "RECIPIENT_NOT_CONFIGURED",
            IntakeError::ServiceUnauthenticated { .. } => "SERVICE_UNAUTHENTICATED",
            IntakeError::ClassificationUnavailable(_) => "CLASSIFICATION_UNAVAILABLE",
            IntakeError::UpstreamError { .. } => "STT_API_ERROR",
            IntakeError::UpstreamUnexpected(_) => "STT_UNEXPECTED_ERROR",
            IntakeError::Persistence(_) => "PERSISTENCE_ERROR",
            IntakeError::NotificationFailed(_) => "NOTIFICATION_FAILED",
            IntakeError::NotFound(_) => "NOT_FOUND",
            IntakeError::UnsupportedMethod(_) => "UNSUPPORTED_METHOD",
        }
    }

    /// Whether the caller sent something we cannot act on
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<TranscriptionError> for IntakeError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::NotConfigured => IntakeError::ServiceUnauthenticated {
                service: "transcription",
            },
            TranscriptionError::Upstream { status, body } => {
                IntakeError::UpstreamError { status, body }
            }
            TranscriptionError::Unexpected(msg) => IntakeError::UpstreamUnexpected(msg),
        }
    }
}

impl From<ClassifierError> for IntakeError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::NotConfigured => IntakeError::ServiceUnauthenticated {
                service: "classification",
            },
            other => IntakeError::ClassificationUnavailable(other.to_string()),
        }
    }
}

impl From<InviteError> for IntakeError {
    fn from(err: InviteError) -> Self {
        IntakeError::NotificationFailed(err.to_string())
    }
}
