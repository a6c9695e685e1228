//! Transport envelope types.
//!
//! `GatewayRequest` is the raw request as a serverless gateway or the HTTP
//! front end hands it over: method, headers, query, a body of unknown
//! encoding, and the gateway's base64 flag. `GatewayResponse` is the
//! `{statusCode, headers, body}` shape returned to it.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::ResponseEnvelope;

/// Request body as received
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// String body (JSON text, base64 text, or latin-1 audio)
    Text(String),
    /// Raw bytes from an HTTP body
    Binary(Vec<u8>),
    /// Body a gateway already parsed into a structure
    Json(Value),
}

impl<'de> Deserialize<'de> for RequestBody {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(Value::Null) => RequestBody::Empty,
            Some(Value::String(s)) => RequestBody::Text(s),
            Some(other) => RequestBody::Json(other),
        })
    }
}

/// Inbound request in gateway event form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    #[serde(default, alias = "method")]
    pub http_method: Option<String>,

    #[serde(default, deserialize_with = "nullable_map")]
    pub headers: HashMap<String, String>,

    #[serde(default, alias = "query", deserialize_with = "nullable_map")]
    pub query_string_parameters: HashMap<String, String>,

    #[serde(default)]
    pub body: RequestBody,

    #[serde(default)]
    pub is_base64_encoded: bool,
}

fn nullable_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl GatewayRequest {
    /// A POST with a string body
    pub fn post_text(content_type: &str, body: impl Into<String>) -> Self {
        Self {
            http_method: Some("POST".to_string()),
            headers: HashMap::from([("Content-Type".to_string(), content_type.to_string())]),
            body: RequestBody::Text(body.into()),
            ..Default::default()
        }
    }

    /// A POST with a binary body
    pub fn post_binary(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            http_method: Some("POST".to_string()),
            headers: HashMap::from([("Content-Type".to_string(), content_type.to_string())]),
            body: RequestBody::Binary(body),
            ..Default::default()
        }
    }

    pub fn with_base64_flag(mut self, flag: bool) -> Self {
        self.is_base64_encoded = flag;
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Upper-cased method, POST when absent
    pub fn method(&self) -> String {
        self.http_method
            .as_deref()
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "POST".to_string())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_string_parameters.get(name).map(String::as_str)
    }
}

/// Response in gateway form
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl GatewayResponse {
    /// Body parsed back into JSON
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

impl From<ResponseEnvelope> for GatewayResponse {
    fn from(envelope: ResponseEnvelope) -> Self {
        Self {
            status_code: envelope.status_code,
            headers: HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]),
            body: envelope.body(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_gateway_event() {
        let event: GatewayRequest = serde_json::from_value(json!({
            "httpMethod": "GET",
            "headers": { "Content-Type": "application/json" },
            "queryStringParameters": { "action": "list", "type": "note" },
            "body": null,
            "isBase64Encoded": false
        }))
        .unwrap();

        assert_eq!(event.method(), "GET");
        assert_eq!(event.query_param("type"), Some("note"));
        assert_eq!(event.body, RequestBody::Empty);
        assert_eq!(event.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_structured_body_and_missing_fields() {
        let event: GatewayRequest = serde_json::from_value(json!({
            "headers": null,
            "body": { "transcript": "hello" }
        }))
        .unwrap();

        assert_eq!(event.method(), "POST");
        assert!(event.headers.is_empty());
        assert!(matches!(event.body, RequestBody::Json(_)));
        assert!(!event.is_base64_encoded);
    }
}
