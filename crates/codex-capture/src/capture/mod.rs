mod classify;
mod delta;
mod document;
mod exchange;
mod filter;
mod handler;
pub mod history;
pub mod mojibake;
pub mod output_dir;
mod persist;
mod reconstruct;
mod sse;
mod summary;

pub use classify::ResponseKind;
pub use delta::{Delta, ToolCallDelta};
pub use document::{CaptureDocument, RequestRecord, ResponseRecord};
pub use exchange::{Exchange, Headers, RecordedRequest, RecordedResponse};
pub use filter::{FilterGate, looks_like_llm_call};
pub use handler::{
    Capture, CaptureContext, CaptureReport, Reconstruction, SkipReason, reconstruct,
};
pub use history::{HistoryEntry, HistoryPage, read_entry, read_latest, read_recent};
pub use persist::{
    HISTORY_FILE, LATEST_FILE, LATEST_REQUEST_FILE, LATEST_RESPONSE_FILE, PersistReport,
    Persister,
};
pub use reconstruct::{ReconstructedPreview, Reconstructor, ToolCall};
pub use sse::{SseEvent, SseEvents, parse_events};
pub use summary::{CaptureSummary, PreviewLimits, truncate_chars};
