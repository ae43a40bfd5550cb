//! Short, human-oriented summary of a captured exchange

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::exchange::Exchange;
use super::reconstruct::ReconstructedPreview;

const ELLIPSIS: char = '…';

/// Truncation limits for preview fields (in characters)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewLimits {
    pub assistant_chars: usize,
    pub user_chars: usize,
}

impl Default for PreviewLimits {
    fn default() -> Self {
        Self {
            assistant_chars: 800,
            user_chars: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub endpoint: String,
    pub method: String,
    pub model: Option<String>,
    pub messages_count: usize,
    pub last_user_message_preview: Option<String>,
    pub system_prompt_chars: usize,
    pub tools_count: usize,
    pub status_code: u16,
    /// Streaming response, or the request asked for one
    pub is_stream: bool,
    /// Whether the body arrived in full (and, for streams, reached `[DONE]`
    /// when the protocol sends one)
    #[serde(default)]
    pub stream_complete: bool,
    pub assistant_text_preview: Option<String>,
    pub assistant_reasoning_preview: Option<String>,
    #[serde(default)]
    pub tool_call_names: Vec<String>,
    pub duration_ms: i64,
}

impl CaptureSummary {
    /// Build the summary. `preview` is expected to be already repaired.
    pub fn build(
        exchange: &Exchange,
        preview: &ReconstructedPreview,
        stream_complete: bool,
        limits: PreviewLimits,
    ) -> Self {
        let request = RequestFacts::from_json(exchange.request_json());

        Self {
            endpoint: exchange.url().to_string(),
            method: exchange.method().to_string(),
            model: request.model,
            messages_count: request.messages_count,
            last_user_message_preview: request
                .last_user
                .map(|text| truncate_chars(&text, limits.user_chars)),
            system_prompt_chars: request.system_chars,
            tools_count: request.tools_count,
            status_code: exchange.response().status_code,
            is_stream: exchange.is_streaming() || request.stream,
            stream_complete,
            assistant_text_preview: non_empty_preview(&preview.content, limits.assistant_chars),
            assistant_reasoning_preview: non_empty_preview(
                &preview.reasoning,
                limits.assistant_chars,
            ),
            tool_call_names: preview
                .tool_calls
                .iter()
                .map(|call| call.name.clone())
                .collect(),
            duration_ms: exchange.duration_ms(),
        }
    }
}

#[derive(Default)]
struct RequestFacts {
    model: Option<String>,
    messages_count: usize,
    last_user: Option<String>,
    system_chars: usize,
    tools_count: usize,
    stream: bool,
}

impl RequestFacts {
    fn from_json(json: Option<&Value>) -> Self {
        let Some(obj) = json.and_then(Value::as_object) else {
            return Self::default();
        };

        let messages = obj
            .get("messages")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
            .and_then(|m| m.get("content"))
            .and_then(message_text);

        let system_chars = messages
            .iter()
            .filter(|m| m.get("role").and_then(Value::as_str) == Some("system"))
            .filter_map(|m| m.get("content").and_then(Value::as_str))
            .map(|content| content.chars().count())
            .sum();

        Self {
            model: obj.get("model").and_then(Value::as_str).map(str::to_string),
            messages_count: messages.len(),
            last_user,
            system_chars,
            tools_count: obj
                .get("tools")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            stream: obj.get("stream").is_some_and(is_truthy),
        }
    }
}

/// Text of a message `content`, which is either a string or a list of parts
fn message_text(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            (!texts.is_empty()).then(|| texts.join("\n"))
        }
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn non_empty_preview(text: &str, limit: usize) -> Option<String> {
    (!text.is_empty()).then(|| truncate_chars(text, limit))
}

/// Keep the first `limit` characters, marking the cut with `…`
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => {
            let mut out = text[..cut].to_string();
            out.push(ELLIPSIS);
            out
        }
        None => text.to_string(),
    }
}
