//! Observational HTTP proxy
//!
//! Relays requests to the model server and streams responses back untouched:
//! - Dynamic passthrough via `/p/{url}`
//! - Configured upstream fallback for every other path
//! - Completed (or abandoned) flows are handed to the capture core on a
//!   blocking worker after the client has its bytes

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, RawQuery, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::capture::{
    Capture, CaptureContext, Exchange, Headers, RecordedRequest, RecordedResponse,
};
use crate::config::ProxyConfig;
use crate::error::{CaptureError, Result};

use super::error::{ProxyError, error_response};
use super::passthrough::UpstreamTarget;
use super::streaming::{BufferHandle, tee};

/// Hop-by-hop headers that are not forwarded in either direction
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
];

/// Shared application state for all handlers
pub struct AppState {
    pub config: ProxyConfig,
    pub client: reqwest::Client,
    pub capture: Arc<CaptureContext>,
}

impl AppState {
    pub fn new(config: ProxyConfig, capture: Arc<CaptureContext>) -> Result<Self> {
        // Idle and connect limits only; a whole-response deadline would cut
        // long streams off mid-relay
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CaptureError::Proxy(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            capture,
        })
    }
}

pub struct ProxyServer {
    config: ProxyConfig,
    capture: Arc<CaptureContext>,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig, capture: Arc<CaptureContext>) -> Self {
        Self { config, capture }
    }

    /// Bind and serve until Ctrl+C / SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let state = Arc::new(AppState::new(self.config.clone(), Arc::clone(&self.capture))?);
        let app = create_router(state);

        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| CaptureError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting capture proxy on {addr}");
        tracing::info!("Writing captures to {}", self.capture.dir().display());
        if !self.capture.filter().is_empty() {
            tracing::info!("Capture filter: URLs containing '{}'", self.capture.filter());
        }
        match &self.config.upstream_url {
            Some(upstream) => tracing::info!("Configured upstream URL: {upstream}"),
            None => tracing::info!("No configured upstream URL (dynamic passthrough only)"),
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CaptureError::Proxy(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| CaptureError::Proxy(format!("Server error: {e}")))?;

        tracing::info!("Capture proxy shut down gracefully");
        Ok(())
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/p/{*upstream_url}", any(dynamic_proxy_handler))
        .fallback(configured_proxy_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "capture_dir": state.capture.dir().display().to_string(),
    }))
}

async fn dynamic_proxy_handler(
    State(state): State<Arc<AppState>>,
    Path(upstream_url): Path<String>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response<Body> {
    let path = format!("/p/{upstream_url}");

    let target = match UpstreamTarget::from_path(&path, query.as_deref()) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("Invalid passthrough URL: {e}");
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_url",
                &format!("Invalid upstream URL: {e}"),
            );
        }
    };

    if !target.is_allowed(&state.config.allowed_hosts) {
        tracing::warn!("Blocked request to disallowed host: {}", target.host);
        return error_response(
            StatusCode::FORBIDDEN,
            "host_not_allowed",
            &format!("Host '{}' is not in the allowlist", target.host),
        );
    }

    forward_request(&state, target.url, method, headers, body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn configured_proxy_handler(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Response<Body> {
    let Some(upstream_base) = &state.config.upstream_url else {
        return error_response(
            StatusCode::NOT_FOUND,
            "no_upstream_configured",
            "No upstream URL configured. Use /p/{url} for dynamic passthrough or configure an upstream_url.",
        );
    };

    let base_url = match Url::parse(upstream_base) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Invalid configured upstream URL: {e}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "invalid_upstream_config",
                "The configured upstream URL is invalid",
            );
        }
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let target_url = match base_url.join(path_and_query) {
        Ok(url) => url,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_path",
                &format!("Invalid request path: {e}"),
            );
        }
    };

    let (parts, body) = request.into_parts();
    forward_request(&state, target_url, parts.method, parts.headers, body)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

/// Relay one request and, if the flow is of interest, tee its response body
/// into the capture core.
async fn forward_request(
    state: &AppState,
    target_url: Url,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> std::result::Result<Response<Body>, ProxyError> {
    let started_at = Utc::now();

    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::Request(format!("Failed to read request body: {e}")))?;

    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|_| ProxyError::Request(format!("Invalid HTTP method: {method}")))?;

    let mut upstream_headers = reqwest::header::HeaderMap::new();
    for (name, value) in forwardable(&headers) {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            upstream_headers.append(name, value);
        }
    }

    tracing::debug!("Proxying {method} {target_url}");

    let wants_capture = state
        .capture
        .check(method.as_str(), target_url.as_str(), &body_bytes)
        .is_ok();
    let recorded_request = wants_capture.then(|| RecordedRequest {
        method: method.to_string(),
        url: target_url.to_string(),
        headers: to_headers(&headers),
        body: body_bytes.to_vec(),
        started_at,
    });

    let upstream = state
        .client
        .request(reqwest_method, target_url)
        .headers(upstream_headers)
        .body(body_bytes)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ProxyError::Network(format!("Request timed out: {e}"))
            } else if e.is_connect() {
                ProxyError::Network(format!("Failed to connect to upstream: {e}"))
            } else {
                ProxyError::Network(format!("Request failed: {e}"))
            }
        })?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|e| ProxyError::Response(format!("Invalid upstream status: {e}")))?;

    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response_headers.append(name, value);
        }
    }

    let body = match recorded_request {
        Some(request) => {
            let (client_stream, handle) = tee(Box::pin(upstream.bytes_stream()));
            spawn_capture(
                Arc::clone(&state.capture),
                request,
                status.as_u16(),
                to_headers(&response_headers),
                handle,
            );
            Body::from_stream(client_stream)
        }
        None => Body::from_stream(upstream.bytes_stream()),
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

/// Wait for the teed body off the response path, then capture on a
/// blocking worker (persistence does synchronous file I/O).
fn spawn_capture(
    capture: Arc<CaptureContext>,
    request: RecordedRequest,
    status_code: u16,
    headers: Headers,
    handle: BufferHandle,
) {
    tokio::spawn(async move {
        let Some(teed) = handle.wait().await else {
            tracing::warn!("Response body for {} was lost before capture", request.url);
            return;
        };

        let exchange = Exchange::new(
            request,
            RecordedResponse {
                status_code,
                headers,
                body: teed.bytes,
                finished_at: teed.finished_at,
                complete: teed.complete,
            },
        );

        let outcome = tokio::task::spawn_blocking(move || {
            let url = exchange.url().to_string();
            (url, capture.handle(&exchange))
        })
        .await;

        match outcome {
            Ok((url, Capture::Recorded(report))) if !report.persisted.is_ok() => {
                tracing::warn!("Capture of {url} was only partially persisted");
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Capture worker failed: {e}"),
        }
    });
}

fn forwardable(headers: &HeaderMap) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
    headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP_HEADERS.contains(&name.as_str()))
}

fn to_headers(headers: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for (name, value) in headers {
        out.insert(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
    }
    out
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
