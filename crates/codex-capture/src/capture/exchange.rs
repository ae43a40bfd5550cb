//! The observed request/response pair handed to the capture core

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::classify::ResponseKind;

/// HTTP header mapping with case-insensitive keys.
///
/// Names are stored lowercased; repeated headers are joined with `", "`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.0
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Headers {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Request half of a flow as seen by the proxy
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub started_at: DateTime<Utc>,
}

/// Response half of a flow as seen by the proxy
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    pub status_code: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub finished_at: DateTime<Utc>,
    /// False when the body stream ended early (client disconnect, upstream error)
    pub complete: bool,
}

/// One observed request/response pair.
///
/// Built once when the flow completes and never mutated afterwards. The
/// response is classified on construction so every later stage sees the
/// same [`ResponseKind`].
#[derive(Debug, Clone)]
pub struct Exchange {
    request: RecordedRequest,
    response: RecordedResponse,
    request_json: Option<Value>,
    kind: ResponseKind,
}

impl Exchange {
    pub fn new(request: RecordedRequest, response: RecordedResponse) -> Self {
        let request_json = serde_json::from_slice(&request.body).ok();
        let kind = ResponseKind::classify(&response.headers);
        Self {
            request,
            response,
            request_json,
            kind,
        }
    }

    pub fn method(&self) -> &str {
        &self.request.method
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn request(&self) -> &RecordedRequest {
        &self.request
    }

    pub fn response(&self) -> &RecordedResponse {
        &self.response
    }

    /// Request body parsed as JSON, if it was valid JSON
    pub fn request_json(&self) -> Option<&Value> {
        self.request_json.as_ref()
    }

    /// Request body decoded lossily as UTF-8
    pub fn request_text(&self) -> String {
        String::from_utf8_lossy(&self.request.body).into_owned()
    }

    /// Response body decoded lossily as UTF-8
    pub fn response_text(&self) -> String {
        String::from_utf8_lossy(&self.response.body).into_owned()
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn is_streaming(&self) -> bool {
        self.kind == ResponseKind::Streaming
    }

    /// Wall time from request start to response end, never negative
    pub fn duration_ms(&self) -> i64 {
        (self.response.finished_at - self.request.started_at)
            .num_milliseconds()
            .max(0)
    }
}
