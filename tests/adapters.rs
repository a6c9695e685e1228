//! Upstream Adapter Integration Tests
//!
//! Each test starts a throwaway HTTP server on a random local port that
//! plays the transcription or chat-completions API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use yessir::adapters::{
    ChatClassifier, ClassifierError, IntentClassifier, Transcriber, TranscriptionError,
    WhisperTranscriber,
};
use yessir::domain::{ParsedIntent, Priority};

/// Request as the mock upstream saw it
#[derive(Debug, Clone, Default)]
struct Captured {
    authorization: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

type Capture = Arc<Mutex<Option<Captured>>>;

#[derive(Clone)]
struct MockState {
    status: u16,
    body: String,
    capture: Capture,
}

async fn mock_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    *state.capture.lock().unwrap() = Some(Captured {
        authorization: header("authorization"),
        content_type: header("content-type"),
        body: body.to_vec(),
    });

    let status = StatusCode::from_u16(state.status).unwrap();
    (
        status,
        [("content-type", "application/json")],
        state.body.clone(),
    )
}

async fn start_mock_server(
    status: u16,
    body: impl Into<String>,
) -> (String, Capture, oneshot::Sender<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let capture: Capture = Arc::new(Mutex::new(None));

    let app = Router::new()
        .route("/v1/endpoint", post(mock_handler))
        .with_state(MockState {
            status,
            body: body.into(),
            capture: Arc::clone(&capture),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{}/v1/endpoint", addr);

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .ok();
    });

    (url, capture, shutdown_tx)
}

fn captured(capture: &Capture) -> Captured {
    capture.lock().unwrap().clone().expect("upstream was called")
}

fn transcriber(url: &str, key: Option<&str>) -> WhisperTranscriber {
    WhisperTranscriber::new(
        key.map(str::to_string),
        url,
        "whisper-large-v3",
        Duration::from_secs(5),
    )
    .unwrap()
}

fn classifier(url: &str, key: Option<&str>) -> ChatClassifier {
    ChatClassifier::new(
        key.map(str::to_string),
        url,
        "gpt-4o-mini",
        0.1,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn chat_reply(content: &str) -> String {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
        .to_string()
}

// ---------------------------------------------------------------------------
// Transcription
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_transcription_sends_multipart_audio() {
    let (url, capture, shutdown) =
        start_mock_server(200, r#"{"text": "  buy milk tomorrow \n"}"#).await;

    let audio = [0x4Fu8, 0x67, 0x67, 0x53, 0x00, 0x0D, 0x0A, 0xFF];
    let text = transcriber(&url, Some("stt-key"))
        .transcribe(&audio, "audio/ogg")
        .await
        .unwrap();

    assert_eq!(text, "buy milk tomorrow");

    let request = captured(&capture);
    assert_eq!(request.authorization.as_deref(), Some("Bearer stt-key"));
    let content_type = request.content_type.unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));

    let body = &request.body;
    assert!(contains(body, b"name=\"model\"\r\n\r\nwhisper-large-v3\r\n"));
    assert!(contains(body, b"filename=\"audio.ogg\""));
    assert!(contains(body, b"Content-Type: audio/ogg\r\n\r\n"));
    assert!(contains(body, &audio), "audio bytes copied verbatim");

    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_transcription_error_status_is_reported() {
    let (url, _capture, shutdown) =
        start_mock_server(401, r#"{"error": "invalid api key"}"#).await;

    let result = transcriber(&url, Some("bad-key"))
        .transcribe(b"RIFF", "audio/wav")
        .await;

    match result {
        Err(TranscriptionError::Upstream { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid api key"));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }

    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_transcription_without_text_is_unexpected() {
    let (url, _capture, shutdown) = start_mock_server(200, r#"{"language": "fi"}"#).await;

    let result = transcriber(&url, Some("stt-key"))
        .transcribe(b"RIFF", "audio/wav")
        .await;

    assert!(matches!(result, Err(TranscriptionError::Unexpected(_))));
    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_transcription_without_key_makes_no_request() {
    let (url, capture, shutdown) = start_mock_server(200, r#"{"text": "hi"}"#).await;

    let result = transcriber(&url, None).transcribe(b"RIFF", "audio/wav").await;

    assert!(matches!(result, Err(TranscriptionError::NotConfigured)));
    assert!(capture.lock().unwrap().is_none());
    shutdown.send(()).ok();
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_classifier_reads_object_reply() {
    let content = r#"{"intent":"MEETING","title":"Meeting with John","datetime":"2024-03-08T14:00:00","duration":30}"#;
    let (url, capture, shutdown) = start_mock_server(200, chat_reply(content)).await;

    let reference = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let intent = classifier(&url, Some("llm-key"))
        .classify("Meet John next Friday at 2pm for half an hour", reference)
        .await
        .unwrap();

    assert_eq!(
        intent,
        ParsedIntent::Meeting {
            title: "Meeting with John".to_string(),
            start_time: "2024-03-08T14:00:00".to_string(),
            duration_minutes: 30,
        }
    );

    let request = captured(&capture);
    assert_eq!(request.authorization.as_deref(), Some("Bearer llm-key"));

    let sent: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(sent["model"], "gpt-4o-mini");
    assert_eq!(sent["response_format"]["type"], "json_object");
    assert_eq!(sent["messages"][0]["role"], "system");
    assert!(sent["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("2024-03-01T12:00:00"));
    assert_eq!(
        sent["messages"][1]["content"],
        "Meet John next Friday at 2pm for half an hour"
    );

    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_classifier_prose_reply_falls_back_to_task() {
    let (url, _capture, shutdown) =
        start_mock_server(200, chat_reply("I think this is a reminder.")).await;

    let intent = classifier(&url, Some("llm-key"))
        .classify("muista ostaa maitoa", Utc::now())
        .await
        .unwrap();

    assert_eq!(
        intent,
        ParsedIntent::Task {
            title: "muista ostaa maitoa".to_string(),
            priority: Priority::Medium,
        }
    );
    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_classifier_error_status_is_upstream_error() {
    let (url, _capture, shutdown) = start_mock_server(500, r#"{"error":"boom"}"#).await;

    let result = classifier(&url, Some("llm-key"))
        .classify("buy milk", Utc::now())
        .await;

    assert!(matches!(
        result,
        Err(ClassifierError::Upstream { status: 500, .. })
    ));
    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_classifier_without_choices_is_invalid() {
    let (url, _capture, shutdown) = start_mock_server(200, r#"{"choices": []}"#).await;

    let result = classifier(&url, Some("llm-key"))
        .classify("buy milk", Utc::now())
        .await;

    assert!(matches!(result, Err(ClassifierError::InvalidResponse(_))));
    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_classifier_without_key_is_not_configured() {
    let result = classifier("http://127.0.0.1:9/unused", Some("   "))
        .classify("buy milk", Utc::now())
        .await;

    assert!(matches!(result, Err(ClassifierError::NotConfigured)));
}
