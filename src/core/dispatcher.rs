//! Request dispatcher.
//!
//! The single entry point every transport calls. Routes by method:
//! - POST: command (text or audio) or keyword upsert
//! - GET: `action=list&type=...`
//! - DELETE: `{id, type}`
//!
//! Every failure is turned into an error envelope here; nothing below this
//! layer builds transport responses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{error, info, instrument, warn};

use super::router::{to_data, IntentRouter};
use crate::adapters::{
    ChatClassifier, IntentClassifier, InviteSender, MockInviteSender, Transcriber,
    WhisperTranscriber,
};
use crate::config::Config;
use crate::domain::{
    Command, CommandInput, KeywordRecord, RecordKind, ResponseEnvelope, ResponseKind,
};
use crate::error::IntakeError;
use crate::ingest::{
    decode_body, decode_json_body, normalize, DecodedBody, GatewayRequest, GatewayResponse,
};
use crate::store::{with_timeout, RecordStore};

/// Settings the dispatcher needs beyond its collaborators
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Reply address for commands that carry none
    pub default_recipient: Option<String>,
    /// Organizer address on meeting invites
    pub sender_email: String,
    pub store_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_recipient: None,
            sender_email: "noreply@example.com".to_string(),
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Normalize → transcribe → classify → route, plus the record surface
pub struct Dispatcher {
    store: Arc<dyn RecordStore>,
    transcriber: Arc<dyn Transcriber>,
    classifier: Arc<dyn IntentClassifier>,
    router: IntentRouter,
    default_recipient: Option<String>,
    store_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transcriber: Arc<dyn Transcriber>,
        classifier: Arc<dyn IntentClassifier>,
        invites: Arc<dyn InviteSender>,
        settings: DispatchSettings,
    ) -> Self {
        let router = IntentRouter::new(
            Arc::clone(&store),
            invites,
            settings.sender_email,
            settings.store_timeout,
        );

        Self {
            store,
            transcriber,
            classifier,
            router,
            default_recipient: settings.default_recipient,
            store_timeout: settings.store_timeout,
        }
    }

    /// Wire the HTTP adapters and the mock invite sender from configuration
    pub fn from_config(config: &Config, store: Arc<dyn RecordStore>) -> Result<Self, IntakeError> {
        let transcriber = WhisperTranscriber::new(
            config.transcription.api_key.clone(),
            config.transcription.url.clone(),
            config.transcription.model.clone(),
            config.transcription.timeout(),
        )?;
        let classifier = ChatClassifier::new(
            config.classifier.api_key.clone(),
            config.classifier.url.clone(),
            config.classifier.model.clone(),
            config.classifier.temperature,
            config.classifier.timeout(),
        )?;

        if config.classifier.api_key.is_none() {
            warn!("LLM_API_KEY not set, text commands will fail");
        }
        if config.transcription.api_key.is_none() {
            warn!("STT_API_KEY not set, audio commands will fail");
        }

        Ok(Self::new(
            store,
            Arc::new(transcriber),
            Arc::new(classifier),
            Arc::new(MockInviteSender::new()),
            DispatchSettings {
                default_recipient: config.mail.default_recipient.clone(),
                sender_email: config.mail.sender.clone(),
                store_timeout: config.storage.timeout(),
            },
        ))
    }

    /// Handle one transport request. Never fails: errors become envelopes.
    #[instrument(skip_all, fields(method = %request.method()))]
    pub async fn handle(&self, request: &GatewayRequest) -> GatewayResponse {
        let started_at = Instant::now();

        let envelope = match self.dispatch(request).await {
            Ok(envelope) => envelope,
            Err(err) => {
                if err.is_client_error() {
                    warn!(code = err.code(), error = %err, "Request rejected");
                } else {
                    error!(code = err.code(), error = %err, "Request failed");
                }
                ResponseEnvelope::from(err)
            }
        };

        info!(
            status = envelope.status_code,
            kind = ?envelope.kind,
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Request handled"
        );

        envelope.into()
    }

    async fn dispatch(&self, request: &GatewayRequest) -> Result<ResponseEnvelope, IntakeError> {
        match request.method().as_str() {
            "POST" => self.handle_post(request).await,
            "GET" => self.handle_list(request).await,
            "DELETE" => self.handle_delete(request).await,
            other => Err(IntakeError::UnsupportedMethod(other.to_string())),
        }
    }

    async fn handle_post(&self, request: &GatewayRequest) -> Result<ResponseEnvelope, IntakeError> {
        let decoded = decode_body(request)?;
        if let DecodedBody::Object(object) = &decoded {
            if is_keyword_request(object) {
                return self.upsert_keyword(object).await;
            }
        }

        let command = normalize(decoded, self.default_recipient.as_deref())?;
        self.execute(command).await
    }

    /// Run a normalized command through transcription, classification and
    /// routing
    #[instrument(skip_all, fields(kind = ?command.kind(), timezone = %command.timezone))]
    pub async fn execute(&self, command: Command) -> Result<ResponseEnvelope, IntakeError> {
        let (text, transcript) = match &command.input {
            CommandInput::Text(text) => (text.clone(), None),
            CommandInput::Audio { bytes, media_type } => {
                let raw = self.transcriber.transcribe(bytes, media_type).await?;
                let text = raw.trim().to_string();
                if text.is_empty() {
                    return Err(IntakeError::MissingTranscript);
                }
                info!(chars = text.len(), "Audio transcribed");
                (text.clone(), Some(text))
            }
        };

        let intent = self.classifier.classify(&text, Utc::now()).await?;
        let envelope = self.router.route(intent, &command).await?;

        Ok(match transcript {
            Some(transcript) => envelope.with_transcript(transcript),
            None => envelope,
        })
    }

    async fn upsert_keyword(
        &self,
        object: &Map<String, Value>,
    ) -> Result<ResponseEnvelope, IntakeError> {
        let key = object
            .get("key")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                IntakeError::MalformedRequest("keyword requires a non-empty 'key'".to_string())
            })?;
        let value = object.get("value").and_then(Value::as_str).ok_or_else(|| {
            IntakeError::MalformedRequest("keyword requires a string 'value'".to_string())
        })?;

        let record = KeywordRecord::new(key, value);
        let stored = with_timeout(self.store_timeout, self.store.save_keyword(&record)).await?;

        info!(key = %stored.key, id = %stored.id, "Keyword saved");
        Ok(ResponseEnvelope::ok(ResponseKind::Keyword, "Keyword saved")
            .with_success(true)
            .with_data(to_data(&stored)))
    }

    async fn handle_list(&self, request: &GatewayRequest) -> Result<ResponseEnvelope, IntakeError> {
        match request.query_param("action").map(str::trim) {
            Some(action) if action.eq_ignore_ascii_case("list") => {}
            Some(other) => {
                return Err(IntakeError::MalformedRequest(format!(
                    "Unsupported action: {}",
                    other
                )))
            }
            None => {
                return Err(IntakeError::MalformedRequest(
                    "Missing 'action' query parameter".to_string(),
                ))
            }
        }

        let kind = parse_kind(request.query_param("type"))?;
        let records = with_timeout(self.store_timeout, self.store.list(kind)).await?;

        info!(kind = %kind, count = records.len(), "Records listed");
        let data = Value::Array(records.iter().map(to_data).collect());
        Ok(
            ResponseEnvelope::ok(ResponseKind::List, format!("Found {} {} records", records.len(), kind))
                .with_success(true)
                .with_data(data),
        )
    }

    async fn handle_delete(
        &self,
        request: &GatewayRequest,
    ) -> Result<ResponseEnvelope, IntakeError> {
        let object = decode_json_body(request)?;

        let id = object
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| IntakeError::MalformedRequest("Missing 'id'".to_string()))?;
        let kind = parse_kind(object.get("type").and_then(Value::as_str))?;

        // Keywords are deleted by key; `id` carries the key
        let removed = with_timeout(self.store_timeout, self.store.delete(kind, id)).await?;

        if removed {
            info!(kind = %kind, id = %id, "Record deleted");
            Ok(ResponseEnvelope::ok(ResponseKind::Delete, format!("Deleted {}", kind))
                .with_success(true)
                .with_data(json!({ "id": id, "type": kind })))
        } else {
            info!(kind = %kind, id = %id, "Delete target not found");
            let missing = IntakeError::NotFound(format!("{} {}", kind, id));
            Ok(ResponseEnvelope::not_found(ResponseKind::Delete, &missing))
        }
    }
}

fn is_keyword_request(object: &Map<String, Value>) -> bool {
    object
        .get("type")
        .and_then(Value::as_str)
        .map(|t| t.trim().eq_ignore_ascii_case("keyword"))
        .unwrap_or(false)
}

fn parse_kind(raw: Option<&str>) -> Result<RecordKind, IntakeError> {
    let raw = raw
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| IntakeError::MalformedRequest("Missing record 'type'".to_string()))?;
    raw.parse().map_err(IntakeError::MalformedRequest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_detection() {
        let object: Map<String, Value> =
            serde_json::from_value(json!({ "type": "Keyword", "key": "home" })).unwrap();
        assert!(is_keyword_request(&object));

        let object: Map<String, Value> =
            serde_json::from_value(json!({ "transcript": "add keyword home" })).unwrap();
        assert!(!is_keyword_request(&object));
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind(Some("todo")).unwrap(), RecordKind::Task);
        assert!(matches!(
            parse_kind(None),
            Err(IntakeError::MalformedRequest(_))
        ));
        assert!(matches!(
            parse_kind(Some("meeting")),
            Err(IntakeError::MalformedRequest(_))
        ));
    }
}
