//! Hand-built `multipart/form-data` encoding.
//!
//! The audio payload is copied into the body byte-for-byte: no charset
//! conversion and no line-ending normalization. The boundary is a fresh
//! random token per form and the content is never scanned for it. A
//! collision with binary audio is possible in principle but not a practical
//! concern since the payload is not adversarial; this is not a cryptographic
//! guarantee.

use uuid::Uuid;

/// A file part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub content: Vec<u8>,
    pub media_type: Option<String>,
}

impl FilePart {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
            media_type: None,
        }
    }

    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Field { name: String, value: String },
    File { name: String, file: FilePart },
}

/// Encoded form ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedForm {
    pub body: Vec<u8>,
    /// Value for the `Content-Type` request header
    pub content_type: String,
}

/// Ordered collection of form parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<Part>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scalar field
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part::Field {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Append a file part
    pub fn file(mut self, name: impl Into<String>, file: FilePart) -> Self {
        self.parts.push(Part::File {
            name: name.into(),
            file,
        });
        self
    }

    /// Encode with a freshly generated boundary
    pub fn encode(&self) -> EncodedForm {
        self.encode_with_boundary(&generate_boundary())
    }

    /// Encode with a caller-chosen boundary
    pub fn encode_with_boundary(&self, boundary: &str) -> EncodedForm {
        let payload: usize = self
            .parts
            .iter()
            .map(|p| match p {
                Part::Field { value, .. } => value.len(),
                Part::File { file, .. } => file.content.len(),
            })
            .sum();
        let mut body = Vec::with_capacity(payload + 128 * (self.parts.len() + 1));

        for part in &self.parts {
            body.extend_from_slice(b"--");
            body.extend_from_slice(boundary.as_bytes());
            body.extend_from_slice(b"\r\n");

            match part {
                Part::Field { name, value } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quoted(name)
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File { name, file } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            escape_quoted(name),
                            escape_quoted(&file.filename)
                        )
                        .as_bytes(),
                    );
                    if let Some(media_type) = &file.media_type {
                        body.extend_from_slice(
                            format!("Content-Type: {}\r\n", strip_line_breaks(media_type))
                                .as_bytes(),
                        );
                    }
                    body.extend_from_slice(b"\r\n");
                    body.extend_from_slice(&file.content);
                }
            }
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(b"--");
        body.extend_from_slice(boundary.as_bytes());
        body.extend_from_slice(b"--\r\n");

        EncodedForm {
            body,
            content_type: format!("multipart/form-data; boundary={}", boundary),
        }
    }
}

/// 32 random hex characters
pub fn generate_boundary() -> String {
    Uuid::new_v4().simple().to_string()
}

// Quotes and line breaks would end the header value early.
fn escape_quoted(value: &str) -> String {
    strip_line_breaks(value).replace('"', "%22")
}

fn strip_line_breaks(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}
