//! Speech-to-text adapter.
//!
//! Posts audio to an OpenAI-compatible `/audio/transcriptions` endpoint as a
//! hand-encoded multipart form and returns the `text` field. One attempt,
//! bounded by the client timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::ingest::{FilePart, MultipartForm};

/// Errors from the transcription service
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Transcription API key not configured")]
    NotConfigured,

    #[error("Transcription API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Transcription failed: {0}")]
    Unexpected(String),
}

/// Turns audio into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], media_type: &str)
        -> Result<String, TranscriptionError>;
}

/// File extension for a declared media type
pub fn extension_for_media_type(media_type: &str) -> &'static str {
    let lower = media_type.to_ascii_lowercase();
    if lower.contains("mpeg") || lower.contains("mp3") {
        "mp3"
    } else if lower.contains("ogg") {
        "ogg"
    } else if lower.contains("m4a") {
        "m4a"
    } else if lower.contains("flac") {
        "flac"
    } else {
        "wav"
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

/// Whisper-style HTTP transcriber
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: Option<String>,
    url: String,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(
        api_key: Option<String>,
        url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranscriptionError::Unexpected(format!("client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            url: url.into(),
            model: model.into(),
        })
    }

    /// Build the upload form for one audio clip
    pub fn build_form(&self, audio: &[u8], media_type: &str) -> MultipartForm {
        let filename = format!("audio.{}", extension_for_media_type(media_type));
        MultipartForm::new().text("model", self.model.clone()).file(
            "file",
            FilePart::new(filename, audio.to_vec()).media_type(media_type),
        )
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        media_type: &str,
    ) -> Result<String, TranscriptionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(TranscriptionError::NotConfigured)?;

        let encoded = self.build_form(audio, media_type).encode();

        tracing::info!(
            bytes = audio.len(),
            media_type = %media_type,
            model = %self.model,
            "Sending audio for transcription"
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .header(reqwest::header::CONTENT_TYPE, encoded.content_type)
            .body(encoded.body)
            .send()
            .await
            .map_err(|e| TranscriptionError::Unexpected(format!("request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Transcription API error");
            return Err(TranscriptionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Unexpected(format!("parse response: {}", e)))?;

        let text = result
            .text
            .ok_or_else(|| TranscriptionError::Unexpected("response missing text".to_string()))?;

        tracing::info!(chars = text.len(), "Transcription completed");

        Ok(text.trim().to_string())
    }
}
