//! Uniform response envelope.
//!
//! Every handler, success or failure, produces one of these. The status code
//! drives the transport status and is not part of the serialized body.

use serde::Serialize;
use serde_json::Value;

use super::ParsedIntent;
use crate::error::IntakeError;

/// What a response is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Todo,
    Note,
    Meeting,
    Transport,
    Keyword,
    List,
    Delete,
    Error,
}

/// Error details attached to failure envelopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(skip)]
    pub status_code: u16,

    #[serde(rename = "type")]
    pub kind: ResponseKind,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    /// Text the intent was resolved from (set for audio commands)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_intent: Option<ParsedIntent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ResponseEnvelope {
    /// A 200 envelope
    pub fn ok(kind: ResponseKind, message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            kind,
            message: message.into(),
            success: None,
            transcript: None,
            parsed_intent: None,
            data: None,
            error: None,
        }
    }

    /// Report a missing target under `kind` instead of as a failure.
    ///
    /// Status, message and error code come from `err`.
    pub fn not_found(kind: ResponseKind, err: &IntakeError) -> Self {
        Self {
            kind,
            ..Self::from(err)
        }
    }

    pub fn with_intent(mut self, intent: ParsedIntent) -> Self {
        self.parsed_intent = Some(intent);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    /// Serialized body
    pub fn body(&self) -> String {
        // The envelope only holds strings, numbers and JSON values.
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"Failed to serialize response"}"#.to_string()
        })
    }
}

impl From<&IntakeError> for ResponseEnvelope {
    fn from(err: &IntakeError) -> Self {
        let (upstream_status, upstream_body) = match err {
            IntakeError::UpstreamError { status, body } => (Some(*status), Some(body.clone())),
            _ => (None, None),
        };

        let details = match err {
            IntakeError::Persistence(inner) => Some(inner.to_string()),
            IntakeError::ClassificationUnavailable(msg)
            | IntakeError::UpstreamUnexpected(msg)
            | IntakeError::NotificationFailed(msg) => Some(msg.clone()),
            _ => None,
        };

        Self {
            status_code: err.status_code(),
            kind: ResponseKind::Error,
            message: err.to_string(),
            success: Some(false),
            transcript: None,
            parsed_intent: None,
            data: None,
            error: Some(ErrorDetail {
                code: err.code().to_string(),
                details,
                upstream_status,
                upstream_body,
            }),
        }
    }
}

impl From<IntakeError> for ResponseEnvelope {
    fn from(err: IntakeError) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_code_not_serialized() {
        let envelope = ResponseEnvelope::ok(ResponseKind::Todo, "Task saved")
            .with_data(json!({ "id": "123" }));
        let body: Value = serde_json::from_str(&envelope.body()).unwrap();

        assert!(body.get("statusCode").is_none());
        assert_eq!(body["type"], "todo");
        assert_eq!(body["data"]["id"], "123");
        assert!(body.get("error").is_none());
    }

    #[test]
    fn test_error_envelope_carries_upstream_details() {
        let err = IntakeError::UpstreamError {
            status: 401,
            body: "invalid key".to_string(),
        };
        let envelope = ResponseEnvelope::from(&err);
        assert_eq!(envelope.status_code, 500);

        let body: Value = serde_json::from_str(&envelope.body()).unwrap();
        assert_eq!(body["type"], "error");
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "STT_API_ERROR");
        assert_eq!(body["error"]["upstreamStatus"], 401);
        assert_eq!(body["error"]["upstreamBody"], "invalid key");
    }

    #[test]
    fn test_not_found_envelope() {
        let err = IntakeError::NotFound("note abc".to_string());
        let envelope = ResponseEnvelope::not_found(ResponseKind::Delete, &err);
        assert_eq!(envelope.status_code, 404);
        assert_eq!(envelope.success, Some(false));

        let body: Value = serde_json::from_str(&envelope.body()).unwrap();
        assert_eq!(body["type"], "delete");
        assert_eq!(body["message"], "Not found: note abc");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
