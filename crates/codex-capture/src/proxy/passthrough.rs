//! Target resolution for the dynamic `/p/{url}` route

use url::Url;

use crate::error::{CaptureError, Result};

/// A validated upstream taken from the request path
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamTarget {
    pub url: Url,
    pub host: String,
}

impl UpstreamTarget {
    /// Parse `/p/{url}` (the `{url}` part may be percent-encoded or have its
    /// `//` collapsed to `/` by an intermediate client).
    ///
    /// Only `http`/`https` are accepted. Fragments and userinfo are dropped;
    /// `query` is carried over as-is.
    pub fn from_path(path: &str, query: Option<&str>) -> Result<Self> {
        let raw = path
            .strip_prefix("/p/")
            .ok_or_else(|| CaptureError::Proxy(format!("Not a passthrough path: {path}")))?;

        let decoded = percent_decode(raw)?;
        let normalized = restore_scheme_slashes(&decoded);

        let mut url = Url::parse(&normalized)
            .map_err(|e| CaptureError::Proxy(format!("Invalid URL '{normalized}': {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CaptureError::Proxy(format!(
                "Unsupported URL scheme '{}': only http and https are allowed",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| CaptureError::Proxy(format!("URL '{normalized}' has no host")))?
            .to_string();

        url.set_fragment(None);
        if !url.username().is_empty() || url.password().is_some() {
            tracing::warn!("Stripping credentials from passthrough URL for host {host}");
            // Cannot fail for http(s) URLs that have a host
            let _ = url.set_username("");
            let _ = url.set_password(None);
        }
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.set_query(Some(q));
        }

        Ok(Self { url, host })
    }

    /// Empty allowlist allows everything; `*.example.com` also matches
    /// `example.com` itself.
    pub fn is_allowed(&self, allowed_hosts: &[String]) -> bool {
        allowed_hosts.is_empty()
            || allowed_hosts
                .iter()
                .any(|pattern| host_matches(&self.host, pattern))
    }
}

fn restore_scheme_slashes(url: &str) -> String {
    for scheme in ["http:", "https:"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            if rest.starts_with('/') && !rest.starts_with("//") {
                return format!("{scheme}/{rest}");
            }
        }
    }
    url.to_string()
}

fn host_matches(host: &str, pattern: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(domain) => {
            host == domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|sub| sub.len() > 1 && sub.ends_with('.'))
        }
        None => host == pattern,
    }
}

/// Percent-decode into bytes first so multi-byte sequences survive
fn percent_decode(input: &str) -> Result<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out)
        .map_err(|e| CaptureError::Proxy(format!("Passthrough URL is not valid UTF-8: {e}")))
}
