//! yessir - voice-command intake endpoint
//!
//! Accepts raw audio or a text transcript, resolves the user's intent
//! (task, note, meeting, transport query) through an external language
//! model, and routes it to a persistence or notification action.
//!
//! # Architecture
//!
//! ```text
//! GatewayRequest → normalize → (transcribe) → classify → route → ResponseEnvelope
//! ```
//!
//! Every request is handled independently; the only shared state is the
//! record store handle, constructed once at startup and injected.
//!
//! # Modules
//!
//! - `domain`: Data structures (Command, ParsedIntent, records, envelope)
//! - `ingest`: Transport envelopes, request normalization, multipart encoding
//! - `adapters`: Transcription, classification and invite services
//! - `store`: Record persistence (SQLite, in-memory)
//! - `core`: Intent routing and request dispatch
//! - `server`: HTTP front end
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Serve the endpoint
//! yessir serve --address 127.0.0.1:8080
//!
//! # Replay one gateway event
//! yessir invoke --event event.json
//!
//! # Seed a keyword
//! yessir keyword set home "1600 Amphitheatre Parkway"
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod server;
pub mod store;

// Re-export main types at crate root for convenience
pub use core::{Dispatcher, IntentRouter};
pub use domain::{Command, ParsedIntent, ResponseEnvelope};
pub use error::IntakeError;
pub use ingest::{GatewayRequest, GatewayResponse};
pub use store::{MemoryStore, RecordStore, SqliteStore};
