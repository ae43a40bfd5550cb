//! Proxy-side failures and their HTTP rendering
//!
//! Upstream responses, including upstream errors, are relayed untouched.
//! Only failures of the proxy itself turn into a `502 Bad Gateway`.

use axum::{
    body::Body,
    http::{Response, StatusCode},
    response::IntoResponse,
};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while relaying a request
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    /// The incoming request could not be read or re-encoded
    #[error("Request error: {0}")]
    Request(String),

    /// Connection, timeout or transport failure talking to upstream
    #[error("Network error: {0}")]
    Network(String),

    /// The relayed response could not be assembled
    #[error("Response error: {0}")]
    Response(String),
}

impl ProxyError {
    /// Short label for log fields
    pub fn category(&self) -> &'static str {
        match self {
            ProxyError::Request(_) => "request",
            ProxyError::Network(_) => "network",
            ProxyError::Response(_) => "response",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response<Body> {
        warn!(error_type = self.category(), "Proxy failure: {}", self);
        error_response(StatusCode::BAD_GATEWAY, "proxy_error", &self.to_string())
    }
}

/// JSON error body in the `{"error": {"type", "message"}}` shape
pub(crate) fn error_response(status: StatusCode, error_type: &str, message: &str) -> Response<Body> {
    let body = serde_json::json!({
        "error": {
            "type": error_type,
            "message": message,
        }
    });

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("application/json"),
    );
    response
}
