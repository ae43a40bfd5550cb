//! Per-exchange capture pipeline
//!
//! Filter gate, classification, reconstruction, repair and persistence for a
//! single completed exchange. Everything except persistence is a pure
//! function of the exchange, so concurrent calls only meet at the writer
//! lock inside [`Persister`].

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use super::classify::ResponseKind;
use super::document::CaptureDocument;
use super::exchange::Exchange;
use super::filter::{FilterGate, looks_like_llm_call};
use super::output_dir;
use super::persist::{PersistReport, Persister};
use super::reconstruct::ReconstructedPreview;
use super::sse::{SseEvent, parse_events};
use super::summary::{CaptureSummary, PreviewLimits};
use crate::config::CaptureConfig;
use crate::error::Result;

/// Why an exchange was not captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// URL does not contain the configured filter
    FilterMismatch,
    /// Not a POST carrying a `"model"` field
    NotModelCall,
}

/// What the pipeline produced for one persisted exchange
#[derive(Debug)]
pub struct CaptureReport {
    pub summary: CaptureSummary,
    pub preview: ReconstructedPreview,
    pub persisted: PersistReport,
}

#[derive(Debug)]
pub enum Capture {
    Skipped(SkipReason),
    Recorded(Box<CaptureReport>),
}

impl Capture {
    pub fn report(&self) -> Option<&CaptureReport> {
        match self {
            Capture::Recorded(report) => Some(report.as_ref()),
            Capture::Skipped(_) => None,
        }
    }
}

/// Resolved capture settings shared by every flow.
///
/// Built once at startup and passed explicitly; holds the only writer for
/// the capture directory.
pub struct CaptureContext {
    gate: FilterGate,
    llm_only: bool,
    limits: PreviewLimits,
    persister: Persister,
}

impl CaptureContext {
    /// Context over an already existing directory
    pub fn new(dir: impl Into<PathBuf>, filter: impl Into<String>) -> Self {
        Self {
            gate: FilterGate::new(filter),
            llm_only: true,
            limits: PreviewLimits::default(),
            persister: Persister::new(dir),
        }
    }

    /// Resolve the directory and settings from configuration.
    ///
    /// Fails if the capture directory cannot be created.
    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        let dir = output_dir::resolve(config.dir.as_deref())?;
        Ok(Self::new(dir, config.filter.clone())
            .with_llm_only(config.llm_only)
            .with_limits(PreviewLimits {
                assistant_chars: config.preview_chars,
                user_chars: config.user_preview_chars,
            }))
    }

    pub fn with_llm_only(mut self, llm_only: bool) -> Self {
        self.llm_only = llm_only;
        self
    }

    pub fn with_limits(mut self, limits: PreviewLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn dir(&self) -> &Path {
        self.persister.dir()
    }

    pub fn filter(&self) -> &str {
        self.gate.filter()
    }

    /// Decide from the request alone whether a flow would be captured
    pub fn check(&self, method: &str, url: &str, body: &[u8]) -> std::result::Result<(), SkipReason> {
        if self.llm_only && !looks_like_llm_call(method, body) {
            return Err(SkipReason::NotModelCall);
        }
        if !self.gate.matches(url) {
            return Err(SkipReason::FilterMismatch);
        }
        Ok(())
    }

    /// Capture one completed exchange
    pub fn handle(&self, exchange: &Exchange) -> Capture {
        let request = exchange.request();
        if let Err(reason) = self.check(&request.method, &request.url, &request.body) {
            debug!("Skipping {} {} ({:?})", request.method, request.url, reason);
            return Capture::Skipped(reason);
        }

        let reconstruction = reconstruct(exchange);
        let preview = reconstruction.preview.repaired();
        let summary = CaptureSummary::build(
            exchange,
            &preview,
            reconstruction.complete,
            self.limits,
        );

        let document = CaptureDocument::new(
            exchange,
            summary.clone(),
            preview.clone(),
            reconstruction.events,
        );
        let persisted = self.persister.persist(exchange, document);

        if persisted.is_ok() {
            info!(
                "Captured #{}: {} {} -> {}",
                persisted.seq,
                summary.model.as_deref().unwrap_or("<no model>"),
                summary.endpoint,
                summary.status_code
            );
        }

        Capture::Recorded(Box::new(CaptureReport {
            summary,
            preview,
            persisted,
        }))
    }
}

/// Reconstruction result before encoding repair
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub preview: ReconstructedPreview,
    /// Parsed records, present only for streaming responses
    pub events: Option<Vec<SseEvent>>,
    /// Body arrived in full and, for streams, a terminal record was seen
    pub complete: bool,
}

/// Rebuild the assistant output of an exchange, streamed or not
pub fn reconstruct(exchange: &Exchange) -> Reconstruction {
    let body = exchange.response_text();
    let arrived = exchange.response().complete;

    match exchange.kind() {
        ResponseKind::Streaming => {
            let events: Vec<SseEvent> = parse_events(&body).collect();
            let preview = ReconstructedPreview::from_events(&events);
            let complete = arrived && events.iter().any(is_terminal);
            Reconstruction {
                preview,
                events: Some(events),
                complete,
            }
        }
        ResponseKind::Batch => {
            let preview = serde_json::from_str::<Value>(&body)
                .map(|doc| ReconstructedPreview::from_document(&doc))
                .unwrap_or_default();
            Reconstruction {
                preview,
                events: None,
                complete: arrived,
            }
        }
    }
}

/// Records that mark the natural end of a stream in the supported protocols
fn is_terminal(event: &SseEvent) -> bool {
    if event.done {
        return true;
    }
    let Some(payload) = &event.payload else {
        return false;
    };
    if payload.get("done").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    matches!(
        payload.get("type").and_then(Value::as_str),
        Some("response.completed" | "message_stop")
    )
}
