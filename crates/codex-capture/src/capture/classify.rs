//! Batch vs streaming classification of a response

use serde::{Deserialize, Serialize};

use super::exchange::Headers;

/// Media types whose bodies arrive as an incremental sequence of records
const STREAMING_MEDIA_TYPES: &[&str] = &["text/event-stream", "application/x-ndjson"];

/// How a response body has to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// A single document (usually JSON, otherwise opaque text)
    Batch,
    /// An event stream to be split into records and replayed
    Streaming,
}

impl ResponseKind {
    /// Classify from the response `content-type`.
    ///
    /// Missing or unparsable content types are treated as [`ResponseKind::Batch`].
    pub fn classify(headers: &Headers) -> Self {
        headers
            .get("content-type")
            .map(Self::from_content_type)
            .unwrap_or(ResponseKind::Batch)
    }

    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if STREAMING_MEDIA_TYPES.contains(&essence.as_str()) {
            ResponseKind::Streaming
        } else {
            ResponseKind::Batch
        }
    }
}
