//! Shared stubs for integration tests.
//!
//! External services are replaced with in-process implementations of the
//! adapter traits; `CountingStore` wraps `MemoryStore` to observe calls.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use yessir::adapters::{
    ClassifierError, IntentClassifier, MockInviteSender, Transcriber, TranscriptionError,
};
use yessir::core::{DispatchSettings, Dispatcher};
use yessir::domain::{KeywordRecord, NoteRecord, ParsedIntent, RecordKind, StoredRecord, TaskRecord};
use yessir::store::{MemoryStore, RecordStore, StoreError};

/// Classifier that always answers with the same intent
pub struct StubClassifier {
    intent: ParsedIntent,
    seen: Mutex<Vec<String>>,
}

impl StubClassifier {
    pub fn new(intent: ParsedIntent) -> Self {
        Self {
            intent,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Texts passed to `classify`
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntentClassifier for StubClassifier {
    async fn classify(
        &self,
        text: &str,
        _reference: DateTime<Utc>,
    ) -> Result<ParsedIntent, ClassifierError> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(self.intent.clone())
    }
}

/// Classifier whose upstream is down
pub struct UnavailableClassifier;

#[async_trait]
impl IntentClassifier for UnavailableClassifier {
    async fn classify(
        &self,
        _text: &str,
        _reference: DateTime<Utc>,
    ) -> Result<ParsedIntent, ClassifierError> {
        Err(ClassifierError::Upstream {
            status: 503,
            body: "overloaded".to_string(),
        })
    }
}

/// Transcriber returning fixed text
pub struct StubTranscriber {
    text: String,
    calls: Mutex<Vec<(usize, String)>>,
}

impl StubTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// (byte count, media type) per call
    pub fn calls(&self) -> Vec<(usize, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        media_type: &str,
    ) -> Result<String, TranscriptionError> {
        self.calls
            .lock()
            .unwrap()
            .push((audio.len(), media_type.to_string()));
        Ok(self.text.clone())
    }
}

/// Transcriber whose upstream rejects the key
pub struct RejectingTranscriber;

#[async_trait]
impl Transcriber for RejectingTranscriber {
    async fn transcribe(
        &self,
        _audio: &[u8],
        _media_type: &str,
    ) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::Upstream {
            status: 401,
            body: "invalid key".to_string(),
        })
    }
}

/// Memory store that counts every call
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn save_task(&self, record: &TaskRecord) -> Result<(), StoreError> {
        self.hit();
        self.inner.save_task(record).await
    }

    async fn save_note(&self, record: &NoteRecord) -> Result<(), StoreError> {
        self.hit();
        self.inner.save_note(record).await
    }

    async fn save_keyword(&self, record: &KeywordRecord) -> Result<KeywordRecord, StoreError> {
        self.hit();
        self.inner.save_keyword(record).await
    }

    async fn list(&self, kind: RecordKind) -> Result<Vec<StoredRecord>, StoreError> {
        self.hit();
        self.inner.list(kind).await
    }

    async fn delete(&self, kind: RecordKind, ident: &str) -> Result<bool, StoreError> {
        self.hit();
        self.inner.delete(kind, ident).await
    }
}

/// Store that never answers
pub struct HangingStore;

#[async_trait]
impl RecordStore for HangingStore {
    async fn save_task(&self, _record: &TaskRecord) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn save_note(&self, _record: &NoteRecord) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn save_keyword(&self, _record: &KeywordRecord) -> Result<KeywordRecord, StoreError> {
        std::future::pending().await
    }

    async fn list(&self, _kind: RecordKind) -> Result<Vec<StoredRecord>, StoreError> {
        std::future::pending().await
    }

    async fn delete(&self, _kind: RecordKind, _ident: &str) -> Result<bool, StoreError> {
        std::future::pending().await
    }
}

/// Dispatcher over the given collaborators with a mock invite sender
pub fn dispatcher(
    store: Arc<dyn RecordStore>,
    transcriber: Arc<dyn Transcriber>,
    classifier: Arc<dyn IntentClassifier>,
    default_recipient: Option<&str>,
) -> Dispatcher {
    Dispatcher::new(
        store,
        transcriber,
        classifier,
        Arc::new(MockInviteSender::new()),
        DispatchSettings {
            default_recipient: default_recipient.map(str::to_string),
            sender_email: "noreply@example.com".to_string(),
            store_timeout: Duration::from_millis(200),
        },
    )
}

/// Dispatcher for text commands that classify as `intent`
pub fn text_dispatcher(store: Arc<dyn RecordStore>, intent: ParsedIntent) -> Dispatcher {
    dispatcher(
        store,
        Arc::new(StubTranscriber::new("unused")),
        Arc::new(StubClassifier::new(intent)),
        None,
    )
}
