//! Fold deltas into the assistant's cumulative output
//!
//! Streamed and batch responses both go through [`Reconstructor`], so the
//! resulting [`ReconstructedPreview`] has the same structure either way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::delta::{Delta, ToolCallDelta};
use super::mojibake;
use super::sse::SseEvent;

/// A tool invocation rebuilt from its fragments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    /// Argument text as received (usually JSON, possibly truncated)
    pub arguments: String,
}

/// Human-readable view of what the assistant produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructedPreview {
    pub content: String,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ReconstructedPreview {
    /// Rebuild from the records of a streamed body
    pub fn from_events<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a SseEvent>,
    {
        let mut reconstructor = Reconstructor::new();
        for event in events {
            reconstructor.feed_event(event);
        }
        reconstructor.finish()
    }

    /// Rebuild from a single complete response document
    pub fn from_document(doc: &Value) -> Self {
        let mut reconstructor = Reconstructor::new();
        for delta in Delta::from_document(doc) {
            reconstructor.apply(delta);
        }
        reconstructor.finish()
    }

    /// Copy with encoding damage in the text fields repaired
    pub fn repaired(&self) -> Self {
        Self {
            content: mojibake::repair(&self.content).into_owned(),
            reasoning: mojibake::repair(&self.reasoning).into_owned(),
            tool_calls: self.tool_calls.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.reasoning.is_empty() && self.tool_calls.is_empty()
    }
}

/// Accumulates deltas in arrival order.
///
/// Tool calls are keyed by their index. Arguments for an index always
/// append, even if other indices were touched in between; a non-empty name
/// replaces the previous one.
#[derive(Debug, Default)]
pub struct Reconstructor {
    content: String,
    reasoning: String,
    tool_calls: BTreeMap<u64, ToolCall>,
}

impl Reconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_event(&mut self, event: &SseEvent) {
        if event.done {
            return;
        }
        let Some(payload) = &event.payload else {
            return;
        };
        for delta in Delta::from_event(payload) {
            self.apply(delta);
        }
    }

    pub fn apply(&mut self, delta: Delta) {
        match delta {
            Delta::Content(text) => self.content.push_str(&text),
            Delta::Reasoning(text) => self.reasoning.push_str(&text),
            Delta::ToolCall(ToolCallDelta {
                index,
                name,
                arguments,
            }) => {
                let call = self.tool_calls.entry(index).or_default();
                if let Some(name) = name.filter(|n| !n.is_empty()) {
                    call.name = name;
                }
                if let Some(arguments) = arguments {
                    call.arguments.push_str(&arguments);
                }
            }
            Delta::Unknown => {}
        }
    }

    pub fn finish(self) -> ReconstructedPreview {
        ReconstructedPreview {
            content: self.content,
            reasoning: self.reasoning,
            tool_calls: self.tool_calls.into_values().collect(),
        }
    }
}
