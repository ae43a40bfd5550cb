//! The combined capture document written to `latest.json` and `history.jsonl`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::exchange::{Exchange, Headers};
use super::reconstruct::ReconstructedPreview;
use super::sse::SseEvent;
use super::summary::CaptureSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureDocument {
    /// Sequence number, assigned under the writer lock
    pub seq: u64,
    /// Capture time, assigned under the writer lock
    pub timestamp: DateTime<Utc>,
    pub summary: CaptureSummary,
    pub preview: ReconstructedPreview,
    pub request: RequestRecord,
    pub response: ResponseRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub body_text: String,
    pub json: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub status_code: u16,
    pub headers: Headers,
    pub streaming: bool,
    pub body_text: String,
    /// Parsed records for streaming responses, `None` for batch ones
    pub events: Option<Vec<SseEvent>>,
}

impl CaptureDocument {
    /// Assemble a document with placeholder `seq`/`timestamp`; the persister
    /// stamps both once it holds the writer lock.
    pub fn new(
        exchange: &Exchange,
        summary: CaptureSummary,
        preview: ReconstructedPreview,
        events: Option<Vec<SseEvent>>,
    ) -> Self {
        let request = exchange.request();
        let response = exchange.response();

        Self {
            seq: 0,
            timestamp: response.finished_at,
            summary,
            preview,
            request: RequestRecord {
                url: request.url.clone(),
                method: request.method.clone(),
                headers: request.headers.clone(),
                body_text: exchange.request_text(),
                json: exchange.request_json().cloned(),
            },
            response: ResponseRecord {
                status_code: response.status_code,
                headers: response.headers.clone(),
                streaming: exchange.is_streaming(),
                body_text: exchange.response_text(),
                events,
            },
        }
    }
}
