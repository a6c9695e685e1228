//! Request normalization.
//!
//! Callers reach us in several encodings: raw audio uploads, JSON text,
//! JSON wrapped in base64 by strict gateways, and JSON carrying an embedded
//! `audio_base64` field. Normalization peels those layers in a fixed order:
//!
//! 1. `content-type: audio/*` → the body is the audio (base64-decoded first
//!    when the gateway flag is set)
//! 2. otherwise the body is JSON (base64-decoded first when flagged)
//! 3. `audio_base64` in the JSON → embedded audio
//! 4. otherwise a non-empty `transcript` is required

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{Map, Value};

use super::gateway::{GatewayRequest, RequestBody};
use crate::domain::{Command, DEFAULT_AUDIO_MEDIA_TYPE, DEFAULT_TIMEZONE};
use crate::error::IntakeError;

/// Content type assumed when the header is absent
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Embedded audio field in JSON bodies
pub const AUDIO_BASE64_FIELD: &str = "audio_base64";

/// Body after the transport encoding has been removed
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Audio { bytes: Vec<u8>, media_type: String },
    Object(Map<String, Value>),
}

/// Turn a decoded body into a command.
///
/// `default_recipient` fills the reply address when the body has no `email`.
pub fn normalize(
    decoded: DecodedBody,
    default_recipient: Option<&str>,
) -> Result<Command, IntakeError> {
    match decoded {
        DecodedBody::Audio { bytes, media_type } => Ok(Command::audio(bytes, media_type)
            .with_reply_email(default_recipient.map(str::to_string))),
        DecodedBody::Object(object) => command_from_object(&object, default_recipient),
    }
}

/// Strip the transport encoding, yielding raw audio or a JSON object
pub fn decode_body(request: &GatewayRequest) -> Result<DecodedBody, IntakeError> {
    let content_type = request
        .header("content-type")
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    if content_type.to_ascii_lowercase().starts_with("audio/") {
        let bytes = decode_audio_body(&request.body, request.is_base64_encoded)?;
        tracing::debug!(bytes = bytes.len(), media_type = %content_type, "Decoded raw audio body");
        return Ok(DecodedBody::Audio {
            bytes,
            media_type: content_type.to_string(),
        });
    }

    decode_json_body(request).map(DecodedBody::Object)
}

/// Parse the body as a JSON object regardless of content type.
///
/// Non-object JSON yields an empty object.
pub fn decode_json_body(request: &GatewayRequest) -> Result<Map<String, Value>, IntakeError> {
    let value = match &request.body {
        RequestBody::Empty => return Ok(Map::new()),
        RequestBody::Json(value) => value.clone(),
        RequestBody::Text(text) => {
            if text.is_empty() {
                return Ok(Map::new());
            }
            let raw = unwrap_base64_text(text.as_bytes(), request.is_base64_encoded);
            parse_json(&raw)?
        }
        RequestBody::Binary(bytes) => {
            if bytes.is_empty() {
                return Ok(Map::new());
            }
            let raw = unwrap_base64_text(bytes, request.is_base64_encoded);
            parse_json(&raw)?
        }
    };

    Ok(match value {
        Value::Object(object) => object,
        _ => Map::new(),
    })
}

/// Build a command from a decoded JSON object
fn command_from_object(
    object: &Map<String, Value>,
    default_recipient: Option<&str>,
) -> Result<Command, IntakeError> {
    let timezone = non_empty_str(object, "timezone").unwrap_or(DEFAULT_TIMEZONE);
    let reply_email = non_empty_str(object, "email")
        .or(default_recipient)
        .map(str::to_string);

    if let Some(embedded) = object.get(AUDIO_BASE64_FIELD).filter(|v| is_truthy(v)) {
        let encoded = embedded.as_str().ok_or_else(|| {
            IntakeError::MalformedRequest("Invalid base64 audio: expected a string".to_string())
        })?;
        let bytes = decode_base64(encoded.as_bytes())
            .map_err(|e| IntakeError::MalformedRequest(format!("Invalid base64 audio: {}", e)))?;
        if bytes.is_empty() {
            return Err(IntakeError::MissingAudio);
        }

        let media_type = non_empty_str(object, "content_type").unwrap_or(DEFAULT_AUDIO_MEDIA_TYPE);
        tracing::debug!(bytes = bytes.len(), media_type = %media_type, "Decoded embedded audio");

        return Ok(Command::audio(bytes, media_type)
            .with_timezone(timezone)
            .with_reply_email(reply_email));
    }

    let transcript = object
        .get("transcript")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .ok_or(IntakeError::MissingTranscript)?;

    Ok(Command::text(transcript)
        .with_timezone(timezone)
        .with_reply_email(reply_email))
}

fn decode_audio_body(body: &RequestBody, is_base64: bool) -> Result<Vec<u8>, IntakeError> {
    let bytes = match body {
        RequestBody::Empty => return Err(IntakeError::MissingAudio),
        RequestBody::Json(_) => {
            return Err(IntakeError::MalformedRequest(
                "Audio content type with a structured body".to_string(),
            ))
        }
        RequestBody::Binary(bytes) if is_base64 => decode_base64(bytes)
            .map_err(|e| IntakeError::MalformedRequest(format!("Invalid base64 body: {}", e)))?,
        RequestBody::Binary(bytes) => bytes.clone(),
        RequestBody::Text(text) if is_base64 => decode_base64(text.as_bytes())
            .map_err(|e| IntakeError::MalformedRequest(format!("Invalid base64 body: {}", e)))?,
        RequestBody::Text(text) => latin1_bytes(text),
    };

    if bytes.is_empty() {
        return Err(IntakeError::MissingAudio);
    }
    Ok(bytes)
}

/// Remove gateway base64 wrapping from a JSON body.
///
/// A flagged body that does not decode is used as-is: some gateways set the
/// flag on bodies they never encoded.
fn unwrap_base64_text(raw: &[u8], is_base64: bool) -> Vec<u8> {
    if !is_base64 {
        return raw.to_vec();
    }
    match decode_base64(raw) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode base64 body, parsing raw");
            raw.to_vec()
        }
    }
}

fn parse_json(raw: &[u8]) -> Result<Value, IntakeError> {
    serde_json::from_slice(raw).map_err(|e| {
        let preview = String::from_utf8_lossy(&raw[..raw.len().min(100)]).into_owned();
        tracing::error!(error = %e, body_start = %preview, "Invalid JSON body");
        IntakeError::MalformedRequest(format!("Invalid JSON body: {}", e))
    })
}

fn decode_base64(raw: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64.decode(compact)
}

/// Bytes of a string body that carried binary audio.
///
/// Gateways that pass binary as text map each byte to one char (latin-1), so
/// chars up to U+00FF map straight back. Anything wider means the text was
/// never binary; its UTF-8 bytes are used instead.
fn latin1_bytes(text: &str) -> Vec<u8> {
    if text.chars().all(|c| (c as u32) <= 0xFF) {
        text.chars().map(|c| c as u32 as u8).collect()
    } else {
        text.as_bytes().to_vec()
    }
}

fn non_empty_str<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}
