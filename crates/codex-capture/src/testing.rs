//! Test utilities for codex-capture - exchange builders and canned bodies
//!
//! Shared by unit tests and the integration tests under `tests/`.

use chrono::{Duration, Utc};

use crate::capture::{Exchange, Headers, RecordedRequest, RecordedResponse};

/// Chat-completions stream with reasoning, two content deltas and `[DONE]`
pub const CHAT_STREAM: &str = concat!(
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"reasoning\":\"Thinking it over.\"}}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"}}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"}}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

/// Batch document equivalent to [`CHAT_STREAM`]
pub const CHAT_BATCH: &str = r#"{"id":"c1","object":"chat.completion","choices":[{"index":0,"message":{"role":"assistant","content":"Hello world","reasoning":"Thinking it over."},"finish_reason":"stop"}]}"#;

/// Ollama native `/api/chat` stream
pub const OLLAMA_NDJSON_STREAM: &str = concat!(
    "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"Hello\"},\"done\":false}\n",
    "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\" world\"},\"done\":false}\n",
    "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"eval_count\":2}\n",
);

/// Minimal chat request body for `model` with one user turn
pub fn chat_request(model: &str, user: &str) -> String {
    serde_json::json!({
        "model": model,
        "stream": true,
        "messages": [{"role": "user", "content": user}],
    })
    .to_string()
}

/// Builder for [`Exchange`] values in tests.
///
/// Defaults to a successful `POST` chat request against a local model
/// server with a small batch response and no content type.
#[derive(Debug, Clone)]
pub struct ExchangeBuilder {
    method: String,
    url: String,
    request_headers: Vec<(String, String)>,
    request_body: Vec<u8>,
    status: u16,
    response_headers: Vec<(String, String)>,
    response_body: Vec<u8>,
    duration_ms: i64,
    complete: bool,
}

impl Default for ExchangeBuilder {
    fn default() -> Self {
        Self {
            method: "POST".to_string(),
            url: "http://127.0.0.1:11434/api/chat".to_string(),
            request_headers: vec![("content-type".to_string(), "application/json".to_string())],
            request_body: chat_request("test-model", "hi").into_bytes(),
            status: 200,
            response_headers: Vec::new(),
            response_body: br#"{"message":{"role":"assistant","content":"ok"},"done":true}"#
                .to_vec(),
            duration_ms: 42,
            complete: true,
        }
    }
}

impl ExchangeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = method.to_string();
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn request_header(mut self, name: &str, value: &str) -> Self {
        self.request_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn request_body(mut self, body: &str) -> Self {
        self.request_body = body.as_bytes().to_vec();
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn response_header(mut self, name: &str, value: &str) -> Self {
        self.response_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn response_body(mut self, body: &str) -> Self {
        self.response_body = body.as_bytes().to_vec();
        self
    }

    pub fn response_bytes(mut self, body: Vec<u8>) -> Self {
        self.response_body = body;
        self
    }

    /// Event-stream response with `body`
    pub fn streamed(self, body: &str) -> Self {
        self.response_header("content-type", "text/event-stream")
            .response_body(body)
    }

    /// Newline-delimited JSON response with `body`
    pub fn ndjson(self, body: &str) -> Self {
        self.response_header("content-type", "application/x-ndjson")
            .response_body(body)
    }

    pub fn duration_ms(mut self, ms: i64) -> Self {
        self.duration_ms = ms;
        self
    }

    /// Mark the response body as cut off before the upstream finished
    pub fn incomplete(mut self) -> Self {
        self.complete = false;
        self
    }

    pub fn build(self) -> Exchange {
        let started_at = Utc::now();
        let finished_at = started_at + Duration::milliseconds(self.duration_ms);

        let request_headers: Headers = self
            .request_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let response_headers: Headers = self
            .response_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        Exchange::new(
            RecordedRequest {
                method: self.method,
                url: self.url,
                headers: request_headers,
                body: self.request_body,
                started_at,
            },
            RecordedResponse {
                status_code: self.status,
                headers: response_headers,
                body: self.response_body,
                finished_at,
                complete: self.complete,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_exchange_is_a_model_call() {
        let exchange = ExchangeBuilder::new().build();
        assert_eq!(exchange.method(), "POST");
        assert_eq!(exchange.request_json().unwrap()["model"], "test-model");
        assert!(!exchange.is_streaming());
    }

    #[test]
    fn duration_is_applied() {
        let exchange = ExchangeBuilder::new().duration_ms(1500).build();
        assert_eq!(exchange.duration_ms(), 1500);
    }

    #[test]
    fn streamed_sets_content_type() {
        let exchange = ExchangeBuilder::new().streamed(CHAT_STREAM).build();
        assert!(exchange.is_streaming());
    }
}
