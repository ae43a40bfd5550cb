//! Integration tests for stream parsing and reconstruction
//!
//! Streamed and batch forms of the same reply must reconstruct to the same
//! preview, and damage in the stream must stay local to the damaged record.

use serde_json::{Value, json};

use codex_capture::capture::{
    ReconstructedPreview, ResponseKind, mojibake, parse_events, reconstruct,
};
use codex_capture::testing::{self, ExchangeBuilder};

// =============================================================================
// Test Fixtures
// =============================================================================

fn preview_of_stream(raw: &str) -> ReconstructedPreview {
    let events: Vec<_> = parse_events(raw).collect();
    ReconstructedPreview::from_events(&events)
}

/// Render a list of chat-completion chunks as an event stream
fn sse(chunks: &[Value]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        out.push_str("data: ");
        out.push_str(&chunk.to_string());
        out.push_str("\n\n");
    }
    out.push_str("data: [DONE]\n\n");
    out
}

/// Split `text` into chat-completion content chunks of `size` characters
fn content_chunks(text: &str, size: usize) -> Vec<Value> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|piece| {
            let piece: String = piece.iter().collect();
            json!({"choices":[{"index":0,"delta":{"content": piece}}]})
        })
        .collect()
}

// =============================================================================
// Stream / Batch Equivalence Tests
// =============================================================================

mod equivalence_tests {
    use super::*;

    #[test]
    fn test_any_chunking_matches_batch() {
        let text = "The quick brown fox — jumps over 🦊 the lazy dog.";
        let batch = ReconstructedPreview::from_document(
            &json!({"choices":[{"message":{"role":"assistant","content": text}}]}),
        );

        for size in 1..=text.chars().count() {
            let streamed = preview_of_stream(&sse(&content_chunks(text, size)));
            assert_eq!(streamed, batch, "chunk size {size}");
        }
    }

    #[test]
    fn test_canned_chat_fixtures_agree() {
        let streamed = preview_of_stream(testing::CHAT_STREAM);
        let batch: Value = serde_json::from_str(testing::CHAT_BATCH).unwrap();
        assert_eq!(streamed, ReconstructedPreview::from_document(&batch));
    }

    #[test]
    fn test_tool_calls_stream_and_batch_agree() {
        let chunks = vec![
            json!({"choices":[{"delta":{"tool_calls":[{"index":0,"id":"a","function":{"name":"read_file","arguments":""}}]}}]}),
            json!({"choices":[{"delta":{"tool_calls":[{"index":1,"id":"b","function":{"name":"shell","arguments":"{\"cmd\""}}]}}]}),
            json!({"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"path\":\"a.rs\"}"}}]}}]}),
            json!({"choices":[{"delta":{"tool_calls":[{"index":1,"function":{"arguments":":\"ls\"}"}}]}}]}),
        ];
        let batch = json!({"choices":[{"message":{"role":"assistant","content":null,"tool_calls":[
            {"id":"a","function":{"name":"read_file","arguments":"{\"path\":\"a.rs\"}"}},
            {"id":"b","function":{"name":"shell","arguments":"{\"cmd\":\"ls\"}"}}
        ]}}]});

        let streamed = preview_of_stream(&sse(&chunks));
        assert_eq!(streamed, ReconstructedPreview::from_document(&batch));
        assert_eq!(streamed.tool_calls.len(), 2);
        assert_eq!(streamed.tool_calls[1].arguments, "{\"cmd\":\"ls\"}");
    }

    #[test]
    fn test_exchange_level_equivalence() {
        let streamed = reconstruct(&ExchangeBuilder::new().streamed(testing::CHAT_STREAM).build());
        let batch = reconstruct(
            &ExchangeBuilder::new()
                .response_header("content-type", "application/json; charset=utf-8")
                .response_body(testing::CHAT_BATCH)
                .build(),
        );
        assert_eq!(streamed.preview, batch.preview);
    }
}

// =============================================================================
// Damage Tolerance Tests
// =============================================================================

mod tolerance_tests {
    use super::*;

    #[test]
    fn test_bare_delta_records() {
        let raw = "data: {\"index\":0,\"delta\":\"Hel\"}\n\ndata: {\"index\":0,\"delta\":\"lo\"}\n\n";
        assert_eq!(preview_of_stream(raw).content, "Hello");
    }

    #[test]
    fn test_garbage_between_records() {
        for garbage in [
            "data: not json at all\n\n",
            "data: {\"unterminated\": \n\n",
            "this line has no field\n\n",
            "data: [1, 2\n\n",
            "data: {\"type\":\"mystery\",\"delta\":{\"weird\":true}}\n\n",
            "data: null\n\n",
        ] {
            let raw = format!(
                "data: {{\"index\":0,\"delta\":\"Hel\"}}\n\n{garbage}data: {{\"index\":0,\"delta\":\"lo\"}}\n\n"
            );
            assert_eq!(preview_of_stream(&raw).content, "Hello", "garbage {garbage:?}");
        }
    }

    #[test]
    fn test_tool_call_without_index_is_ignored() {
        let chunks = vec![
            json!({"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"f","arguments":"{"}}]}}]}),
            json!({"choices":[{"delta":{"tool_calls":[{"function":{"arguments":"LOST"}}]}}]}),
            json!({"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"}"}}]}}]}),
        ];
        let preview = preview_of_stream(&sse(&chunks));
        assert_eq!(preview.tool_calls.len(), 1);
        assert_eq!(preview.tool_calls[0].arguments, "{}");
    }

    #[test]
    fn test_cut_off_stream_keeps_prefix() {
        let full = sse(&content_chunks("abcdefghij", 2));
        for cut in 0..full.len() {
            if !full.is_char_boundary(cut) {
                continue;
            }
            let preview = preview_of_stream(&full[..cut]);
            assert!(
                "abcdefghij".starts_with(&preview.content),
                "cut at {cut} produced {:?}",
                preview.content
            );
        }
    }
}

// =============================================================================
// Classification and Repair Tests
// =============================================================================

mod classify_repair_tests {
    use super::*;

    #[test]
    fn test_classifier_decides_parse_path() {
        assert_eq!(
            ResponseKind::from_content_type("text/event-stream"),
            ResponseKind::Streaming
        );
        // An SSE body labelled as JSON is not re-inspected
        let exchange = ExchangeBuilder::new()
            .response_header("content-type", "application/json")
            .response_body(testing::CHAT_STREAM)
            .build();
        let reconstruction = reconstruct(&exchange);
        assert!(reconstruction.events.is_none());
        assert!(reconstruction.preview.is_empty());
    }

    #[test]
    fn test_repair_is_idempotent_over_mangled_previews() {
        let samples = [
            "Itâ€™s fine",
            "naÃ¯ve cafÃ©",
            "emoji ðŸ˜€ here",
            "clean text",
            "â€œquotedâ€\u{9d}",
            "",
        ];
        for sample in samples {
            let once = mojibake::repair(sample).into_owned();
            assert_eq!(mojibake::repair(&once), once, "sample {sample:?}");
        }
    }
}
