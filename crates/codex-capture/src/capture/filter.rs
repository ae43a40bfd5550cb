//! Decide whether an observed flow is captured at all

/// URL substring gate.
///
/// An empty filter captures everything; otherwise the request URL must
/// contain the filter verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGate {
    filter: String,
}

impl FilterGate {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn matches(&self, url: &str) -> bool {
        self.filter.is_empty() || url.contains(&self.filter)
    }
}

/// Heuristic for "this looks like a model call": a POST whose body
/// mentions a `"model"` key.
pub fn looks_like_llm_call(method: &str, body: &[u8]) -> bool {
    if !method.eq_ignore_ascii_case("POST") {
        return false;
    }
    let needle = br#""model""#;
    body.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_port_substring() {
        let gate = FilterGate::new("11434");
        assert!(gate.matches("http://127.0.0.1:11434/api/chat"));
        assert!(!gate.matches("http://example.com/x"));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let gate = FilterGate::default();
        assert!(gate.matches("http://example.com/x"));
        assert!(gate.matches(""));
    }

    #[test]
    fn test_filter_is_case_sensitive() {
        let gate = FilterGate::new("/API/");
        assert!(!gate.matches("http://localhost/api/chat"));
    }

    #[test]
    fn test_looks_like_llm_call() {
        assert!(looks_like_llm_call("POST", br#"{"model":"llama3"}"#));
        assert!(looks_like_llm_call("post", br#"{ "model" : "x" }"#));
        assert!(!looks_like_llm_call("GET", br#"{"model":"llama3"}"#));
        assert!(!looks_like_llm_call("POST", br#"{"prompt":"hi"}"#));
        assert!(!looks_like_llm_call("POST", b""));
    }
}
