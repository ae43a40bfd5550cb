//! Event-stream parsing
//!
//! Splits a fully buffered streaming body into discrete records:
//! - records are separated by blank lines
//! - `event:` sets the record label, `data:` lines accumulate (joined with `\n`)
//! - `:` comments, `id:`/`retry:` and unknown fields are skipped
//! - a line starting with `{` or `[` outside a `data:` field is a record on its
//!   own, which covers newline-delimited JSON streams
//!
//! Unparsable payloads never stop the parser; they come out as events with no
//! JSON payload and the raw text preserved.

use std::iter::Peekable;
use std::str::Lines;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const DONE_SENTINEL: &str = "[DONE]";

/// One record from a streamed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SseEvent {
    /// Label from the `event:` field, if any
    pub event: Option<String>,
    /// Raw record text (joined `data:` lines, or the bare JSON line)
    pub data: String,
    /// Parsed JSON payload, `None` when the record is not valid JSON
    #[serde(rename = "json")]
    pub payload: Option<Value>,
    /// True for the `[DONE]` terminal marker
    #[serde(default)]
    pub done: bool,
}

impl SseEvent {
    fn from_parts(event: Option<String>, data: String) -> Self {
        let done = data.trim() == DONE_SENTINEL;
        let payload = if done {
            None
        } else {
            serde_json::from_str(&data).ok()
        };
        Self {
            event,
            data,
            payload,
            done,
        }
    }
}

/// Lazy iterator over the records of a streamed body.
///
/// Consumes the body once; a trailing record without a terminating blank
/// line is still yielded when the input runs out.
pub struct SseEvents<'a> {
    lines: Peekable<Lines<'a>>,
}

/// Parse a buffered event stream into records
pub fn parse_events(body: &str) -> SseEvents<'_> {
    let body = body.strip_prefix('\u{FEFF}').unwrap_or(body);
    SseEvents {
        lines: body.lines().peekable(),
    }
}

fn is_bare_json(line: &str) -> bool {
    matches!(line.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}

impl Iterator for SseEvents<'_> {
    type Item = SseEvent;

    fn next(&mut self) -> Option<SseEvent> {
        let mut label: Option<String> = None;
        let mut data: Option<String> = None;

        loop {
            let Some(&line) = self.lines.peek() else {
                return data.map(|d| SseEvent::from_parts(label, d));
            };

            if is_bare_json(line) {
                if let Some(d) = data {
                    // Leave the JSON line for the next call
                    return Some(SseEvent::from_parts(label, d));
                }
                self.lines.next();
                return Some(SseEvent::from_parts(label, line.trim().to_string()));
            }

            self.lines.next();

            if line.is_empty() {
                if let Some(d) = data {
                    return Some(SseEvent::from_parts(label, d));
                }
                label = None;
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => label = Some(value.to_string()),
                "data" => match data.as_mut() {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                },
                _ => {}
            }
        }
    }
}
