//! Intent classification via a chat-completions model.
//!
//! The model is asked for a single JSON object. If its reply is not a JSON
//! object the utterance is kept as a medium-priority task with the original
//! text as title; classification is best-effort and must not block
//! persistence. Transport and envelope failures are real errors.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::log_preview;
use crate::domain::ParsedIntent;

/// Placeholder replaced with the reference timestamp
const CURRENT_TIME_PLACEHOLDER: &str = "{{current_time}}";

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a personal assistant that understands English and Finnish.
Read the user's spoken command (English or Finnish) and extract structured data from it.

Pick exactly ONE of the intents below and answer with ONLY a JSON object using English keys.

### 1. MEETING
Use when the user wants to schedule a meeting, call, appointment or event.
Finnish examples: "Varaa kalenterista...", "Tapaaminen...", "Sovittu meno..."
Schema:
{
  "intent": "MEETING",
  "title": "string (short summary, e.g. 'Meeting with John')",
  "datetime": "string (absolute ISO 8601 time, resolved against {{current_time}})",
  "duration": "integer (minutes, 60 when not stated)"
}

### 2. TODO
Use when the user wants to remember a task, buy something or do something later.
Finnish examples: "Muista ostaa...", "Tee tämä myöhemmin...", "Lisää listalle..."
Schema:
{
  "intent": "TODO",
  "title": "string (the task)",
  "priority": "string (one of 'low', 'medium', 'high'; 'medium' when not stated)"
}

### 3. NOTE
Use when the user wants to keep a thought or piece of information that is neither a task nor a meeting.
Finnish examples: "Kirjoita muistiinpano...", "Laita ylös...", "Aivopesu..."
Schema:
{
  "intent": "NOTE",
  "title": "string (the full content of the note)"
}

### 4. TRANSPORT
Use when the user asks for public transport directions, bus routes or train times to a destination.
Finnish examples: "Miten pääsen...", "Bussiaikataulut...", "Reitti kohteeseen..."
Schema:
{
  "intent": "TRANSPORT",
  "destination": "string (name or address of the destination)"
}

### RULES
1. The current time is {{current_time}}. Resolve relative dates such as "tomorrow" (huomenna), "next Friday" (ensi perjantaina) or "in 2 hours" (kahden tunnin päästä) against it.
2. If the intent is unclear, use TODO.
3. Output raw JSON only. No Markdown code fences, no explanations.
"#;

/// Errors from the classification service
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier API key not configured")]
    NotConfigured,

    #[error("classifier request timed out")]
    Timeout,

    #[error("classifier returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("classifier request failed: {0}")]
    Request(String),

    #[error("invalid classifier response: {0}")]
    InvalidResponse(String),
}

/// Classifies free text into a [`ParsedIntent`]
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        reference: DateTime<Utc>,
    ) -> Result<ParsedIntent, ClassifierError>;
}

/// System prompt with the reference timestamp substituted
pub fn build_system_prompt(reference: DateTime<Utc>) -> String {
    let timestamp = reference.to_rfc3339_opts(SecondsFormat::Micros, false);
    SYSTEM_PROMPT_TEMPLATE.replace(CURRENT_TIME_PLACEHOLDER, &timestamp)
}

/// Read the model's reply, falling back to a task for anything that is not
/// a JSON object
pub fn parse_model_content(content: &str, original_text: &str) -> ParsedIntent {
    match serde_json::from_str::<Value>(content) {
        Ok(value) if value.is_object() => ParsedIntent::from_model_json(&value),
        Ok(_) => {
            tracing::warn!(
                content = %log_preview(content),
                "Classifier returned non-object JSON, falling back to TODO"
            );
            ParsedIntent::fallback(original_text)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                content = %log_preview(content),
                "Classifier JSON parse failed, falling back to TODO"
            );
            ParsedIntent::fallback(original_text)
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions classifier
pub struct ChatClassifier {
    client: reqwest::Client,
    api_key: Option<String>,
    url: String,
    model: String,
    temperature: f32,
}

impl ChatClassifier {
    pub fn new(
        api_key: Option<String>,
        url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Request(format!("client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            url: url.into(),
            model: model.into(),
            temperature,
        })
    }
}

#[async_trait]
impl IntentClassifier for ChatClassifier {
    async fn classify(
        &self,
        text: &str,
        reference: DateTime<Utc>,
    ) -> Result<ParsedIntent, ClassifierError> {
        let api_key = self.api_key.as_deref().ok_or(ClassifierError::NotConfigured)?;

        let system_prompt = build_system_prompt(reference);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        tracing::debug!(model = %self.model, chars = text.len(), "Classifying transcript");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout
                } else {
                    ClassifierError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "Classifier API request failed");
            return Err(ClassifierError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ClassifierError::Timeout
            } else {
                ClassifierError::InvalidResponse(e.to_string())
            }
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifierError::InvalidResponse("no message content".to_string()))?;

        tracing::info!(content = %log_preview(&content), "Classifier raw response");

        let intent = parse_model_content(&content, text);
        tracing::info!(intent = intent.label(), "Transcript classified");
        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;
    use chrono::TimeZone;

    #[test]
    fn test_prompt_embeds_reference_time() {
        let reference = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let prompt = build_system_prompt(reference);

        assert!(!prompt.contains(CURRENT_TIME_PLACEHOLDER));
        assert!(prompt.contains("2024-03-01T12:30:00.000000+00:00"));
        for tag in ["MEETING", "TODO", "NOTE", "TRANSPORT"] {
            assert!(prompt.contains(tag));
        }
    }

    #[test]
    fn test_prose_reply_falls_back_to_task() {
        let intent = parse_model_content("Sure! Here is your task.", "buy milk tomorrow");
        assert_eq!(
            intent,
            ParsedIntent::Task {
                title: "buy milk tomorrow".to_string(),
                priority: Priority::Medium,
            }
        );
    }

    #[test]
    fn test_array_reply_falls_back_to_task() {
        let intent = parse_model_content("[1, 2]", "call mom");
        assert_eq!(intent, ParsedIntent::fallback("call mom"));
    }

    #[test]
    fn test_object_reply_is_trusted() {
        let intent = parse_model_content(
            r#"{"intent":"NOTE","title":"Sauna is 80 degrees"}"#,
            "Kirjoita muistiinpano",
        );
        assert_eq!(
            intent,
            ParsedIntent::Note {
                title: "Sauna is 80 degrees".to_string()
            }
        );
    }
}
