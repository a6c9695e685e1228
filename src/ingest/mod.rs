//! Request intake.
//!
//! Turns whatever the transport delivered into something the pipeline can
//! work with, and encodes outbound form uploads:
//!
//! 1. **Gateway**: transport request/response envelopes
//! 2. **Normalizer**: recovers a canonical `Command` from the body encoding
//! 3. **Multipart**: builds `multipart/form-data` bodies for audio uploads
//!
//! # Architecture
//!
//! ```text
//! GatewayRequest → decode_body → DecodedBody ─┬→ Command (POST)
//!                                             └→ JSON object (keyword/delete)
//! ```

pub mod gateway;
pub mod multipart;
pub mod normalizer;

// Re-export key types
pub use gateway::{GatewayRequest, GatewayResponse, RequestBody};
pub use multipart::{generate_boundary, EncodedForm, FilePart, MultipartForm};
pub use normalizer::{
    decode_body, decode_json_body, normalize, DecodedBody, AUDIO_BASE64_FIELD,
    DEFAULT_CONTENT_TYPE,
};
