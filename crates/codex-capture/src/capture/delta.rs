//! Recognised payload shapes
//!
//! Every event payload (and every batch document) is reduced to a list of
//! [`Delta`]s. The set of shapes is closed: anything not listed here becomes
//! [`Delta::Unknown`], which reconstruction ignores.
//!
//! Streaming shapes:
//! - chat completions chunks: `choices[].delta.{content,text,reasoning,reasoning_content,thinking,tool_calls}`
//! - bare `{"delta": "<text>"}` records
//! - Ollama native chunks: `message.{content,thinking,tool_calls}`, `response`, `thinking`
//! - Responses API events keyed by `type` (`response.output_text.delta`, ...)
//! - Anthropic messages events (`content_block_start`, `content_block_delta`)
//!
//! Batch documents use the matching complete forms. Chat completions with
//! several choices contribute only their first choice on both paths.

use serde_json::Value;

/// One incremental piece of an assistant reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Text to append to the visible assistant output
    Content(String),
    /// Text to append to the reasoning/thinking channel
    Reasoning(String),
    /// Fragment of a tool invocation, keyed by its index
    ToolCall(ToolCallDelta),
    /// A payload shape this crate does not understand
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallDelta {
    pub index: u64,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

impl Delta {
    /// Deltas carried by one streamed event payload
    pub fn from_event(payload: &Value) -> Vec<Delta> {
        let mut out = Vec::new();

        if let Some(kind) = payload.get("type").and_then(Value::as_str) {
            if kind.starts_with("response.") {
                responses_event(kind, payload, &mut out);
                return or_unknown(out);
            }
            if kind.starts_with("content_block_") {
                anthropic_event(kind, payload, &mut out);
                return or_unknown(out);
            }
        }

        if let Some(choices) = payload.get("choices").and_then(Value::as_array) {
            for choice in primary_choice(choices) {
                if let Some(delta) = choice.get("delta") {
                    chat_message(delta, true, &mut out);
                } else if let Some(text) = str_field(choice, "text") {
                    out.push(Delta::Content(text.to_string()));
                }
            }
            return or_unknown(out);
        }

        if ollama_chunk(payload, &mut out) {
            return or_unknown(out);
        }

        if let Some(text) = str_field(payload, "delta") {
            out.push(Delta::Content(text.to_string()));
        }

        or_unknown(out)
    }

    /// Deltas equivalent to a complete (non-streamed) response document
    pub fn from_document(doc: &Value) -> Vec<Delta> {
        let mut out = Vec::new();

        if let Some(choices) = doc.get("choices").and_then(Value::as_array) {
            for choice in primary_choice(choices) {
                match choice.get("message") {
                    Some(message) => chat_message(message, false, &mut out),
                    None => {
                        if let Some(text) = str_field(choice, "text") {
                            out.push(Delta::Content(text.to_string()));
                        }
                    }
                }
                if let Some(reasoning) = str_field(choice, "reasoning") {
                    out.push(Delta::Reasoning(reasoning.to_string()));
                }
            }
            if !out.iter().any(|d| matches!(d, Delta::Reasoning(_))) {
                if let Some(reasoning) = str_field(doc, "reasoning") {
                    out.push(Delta::Reasoning(reasoning.to_string()));
                }
            }
            return or_unknown(out);
        }

        if let Some(output) = doc.get("output").and_then(Value::as_array) {
            responses_output(output, &mut out);
            return or_unknown(out);
        }

        if let Some(blocks) = doc.get("content").and_then(Value::as_array) {
            for (index, block) in blocks.iter().enumerate() {
                anthropic_block(index as u64, block, &mut out);
            }
            return or_unknown(out);
        }

        ollama_chunk(doc, &mut out);
        or_unknown(out)
    }
}

fn or_unknown(out: Vec<Delta>) -> Vec<Delta> {
    if out.is_empty() {
        vec![Delta::Unknown]
    } else {
        out
    }
}

/// Only the first choice (`index` 0, or position 0 without one) is
/// reconstructed when a request asked for several
fn primary_choice(choices: &[Value]) -> impl Iterator<Item = &Value> {
    choices.iter().enumerate().filter_map(|(position, choice)| {
        let index = index_field(choice, "index").unwrap_or(position as u64);
        (index == 0).then_some(choice)
    })
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn index_field(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}

/// Tool arguments arrive either as (partial) JSON text or as a JSON object
fn arguments_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A chat-completions `delta` (streaming) or `message` (batch) object.
///
/// Streamed tool calls must carry their own `index`; entries without one
/// are dropped. Complete messages fall back to the array position.
fn chat_message(message: &Value, streaming: bool, out: &mut Vec<Delta>) {
    if let Some(content) = str_field(message, "content") {
        out.push(Delta::Content(content.to_string()));
    } else if let Some(text) = str_field(message, "text") {
        out.push(Delta::Content(text.to_string()));
    }

    for key in ["reasoning", "reasoning_content", "thinking"] {
        if let Some(reasoning) = str_field(message, key) {
            out.push(Delta::Reasoning(reasoning.to_string()));
            break;
        }
    }

    let Some(calls) = message.get("tool_calls").and_then(Value::as_array) else {
        return;
    };
    for (position, call) in calls.iter().enumerate() {
        let index = match index_field(call, "index") {
            Some(index) => index,
            None if !streaming => position as u64,
            None => {
                tracing::debug!("Ignoring streamed tool call delta without an index");
                continue;
            }
        };
        let function = call.get("function").unwrap_or(&Value::Null);
        out.push(Delta::ToolCall(ToolCallDelta {
            index,
            name: str_field(function, "name").map(str::to_string),
            arguments: function.get("arguments").and_then(arguments_text),
        }));
    }
}

/// Ollama native `/api/chat` and `/api/generate` shapes. Returns true if the
/// payload looked like one, even if every field was empty.
fn ollama_chunk(payload: &Value, out: &mut Vec<Delta>) -> bool {
    if let Some(message) = payload.get("message").filter(|m| m.is_object()) {
        if let Some(content) = str_field(message, "content").filter(|s| !s.is_empty()) {
            out.push(Delta::Content(content.to_string()));
        }
        if let Some(thinking) = str_field(message, "thinking").filter(|s| !s.is_empty()) {
            out.push(Delta::Reasoning(thinking.to_string()));
        }
        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for (position, call) in calls.iter().enumerate() {
                let function = call.get("function").unwrap_or(&Value::Null);
                out.push(Delta::ToolCall(ToolCallDelta {
                    index: index_field(function, "index").unwrap_or(position as u64),
                    name: str_field(function, "name").map(str::to_string),
                    arguments: function.get("arguments").and_then(arguments_text),
                }));
            }
        }
        return true;
    }

    let mut matched = false;
    if let Some(response) = str_field(payload, "response") {
        matched = true;
        if !response.is_empty() {
            out.push(Delta::Content(response.to_string()));
        }
    }
    if let Some(thinking) = str_field(payload, "thinking") {
        matched = true;
        if !thinking.is_empty() {
            out.push(Delta::Reasoning(thinking.to_string()));
        }
    }
    matched
}

fn responses_event(kind: &str, payload: &Value, out: &mut Vec<Delta>) {
    match kind {
        "response.output_text.delta" => {
            if let Some(delta) = str_field(payload, "delta") {
                out.push(Delta::Content(delta.to_string()));
            }
        }
        "response.reasoning_text.delta" | "response.reasoning_summary_text.delta" => {
            if let Some(delta) = str_field(payload, "delta") {
                out.push(Delta::Reasoning(delta.to_string()));
            }
        }
        "response.output_item.added" => {
            let Some(item) = payload.get("item") else {
                return;
            };
            if str_field(item, "type") != Some("function_call") {
                return;
            }
            if let Some(index) = index_field(payload, "output_index") {
                out.push(Delta::ToolCall(ToolCallDelta {
                    index,
                    name: str_field(item, "name").map(str::to_string),
                    arguments: None,
                }));
            }
        }
        "response.function_call_arguments.delta" => {
            if let (Some(index), Some(delta)) = (
                index_field(payload, "output_index"),
                str_field(payload, "delta"),
            ) {
                out.push(Delta::ToolCall(ToolCallDelta {
                    index,
                    name: None,
                    arguments: Some(delta.to_string()),
                }));
            }
        }
        _ => {}
    }
}

fn responses_output(output: &[Value], out: &mut Vec<Delta>) {
    for (index, item) in output.iter().enumerate() {
        match str_field(item, "type") {
            Some("message") => {
                for part in item
                    .get("content")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                {
                    if str_field(part, "type") == Some("output_text") {
                        if let Some(text) = str_field(part, "text") {
                            out.push(Delta::Content(text.to_string()));
                        }
                    }
                }
            }
            Some("reasoning") => {
                for key in ["summary", "content"] {
                    for part in item.get(key).and_then(Value::as_array).into_iter().flatten() {
                        if let Some(text) = str_field(part, "text") {
                            out.push(Delta::Reasoning(text.to_string()));
                        }
                    }
                }
            }
            Some("function_call") => out.push(Delta::ToolCall(ToolCallDelta {
                index: index as u64,
                name: str_field(item, "name").map(str::to_string),
                arguments: item.get("arguments").and_then(arguments_text),
            })),
            _ => {}
        }
    }
}

fn anthropic_event(kind: &str, payload: &Value, out: &mut Vec<Delta>) {
    let Some(index) = index_field(payload, "index") else {
        return;
    };
    match kind {
        "content_block_start" => {
            if let Some(block) = payload.get("content_block") {
                if str_field(block, "type") == Some("tool_use") {
                    out.push(Delta::ToolCall(ToolCallDelta {
                        index,
                        name: str_field(block, "name").map(str::to_string),
                        arguments: tool_input(block),
                    }));
                }
            }
        }
        "content_block_delta" => {
            let Some(delta) = payload.get("delta") else {
                return;
            };
            match str_field(delta, "type") {
                Some("text_delta") => {
                    if let Some(text) = str_field(delta, "text") {
                        out.push(Delta::Content(text.to_string()));
                    }
                }
                Some("thinking_delta") => {
                    if let Some(thinking) = str_field(delta, "thinking") {
                        out.push(Delta::Reasoning(thinking.to_string()));
                    }
                }
                Some("input_json_delta") => {
                    if let Some(partial) = str_field(delta, "partial_json") {
                        out.push(Delta::ToolCall(ToolCallDelta {
                            index,
                            name: None,
                            arguments: Some(partial.to_string()),
                        }));
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
}

/// `tool_use.input`; an empty object carries no argument text, since
/// streams open every block with `{}` and send the real input as
/// `input_json_delta` fragments
fn tool_input(block: &Value) -> Option<String> {
    match block.get("input") {
        Some(Value::Object(map)) if map.is_empty() => None,
        Some(input) => arguments_text(input),
        None => None,
    }
}

fn anthropic_block(index: u64, block: &Value, out: &mut Vec<Delta>) {
    match str_field(block, "type") {
        Some("text") => {
            if let Some(text) = str_field(block, "text") {
                out.push(Delta::Content(text.to_string()));
            }
        }
        Some("thinking") => {
            if let Some(thinking) = str_field(block, "thinking") {
                out.push(Delta::Reasoning(thinking.to_string()));
            }
        }
        Some("tool_use") => out.push(Delta::ToolCall(ToolCallDelta {
            index,
            name: str_field(block, "name").map(str::to_string),
            arguments: tool_input(block),
        })),
        _ => {}
    }
}
