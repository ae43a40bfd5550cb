//! Read-side access to persisted captures
//!
//! History entries are addressed by their 0-based line number in
//! `history.jsonl`. Lines that fail to parse keep their number but are
//! skipped in listings.

use std::path::Path;

use super::document::CaptureDocument;
use super::persist::{HISTORY_FILE, LATEST_FILE};
use crate::error::{CaptureError, Result};

/// One readable history line
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub index: usize,
    pub document: CaptureDocument,
}

/// A window of the newest history entries, oldest first
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    /// Number of lines in the history file, readable or not
    pub total: usize,
    pub entries: Vec<HistoryEntry>,
}

impl HistoryPage {
    /// Index of the newest line, if there is any history
    pub fn last_index(&self) -> Option<usize> {
        self.total.checked_sub(1)
    }
}

/// Read `latest.json`; `Ok(None)` when nothing has been captured yet
pub fn read_latest(dir: &Path) -> Result<Option<CaptureDocument>> {
    let path = dir.join(LATEST_FILE);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CaptureError::Io(e)),
    };
    let document = serde_json::from_str(&text).map_err(|e| {
        CaptureError::Serialization(format!("{} is not a capture: {}", path.display(), e))
    })?;
    Ok(Some(document))
}

/// The newest `limit` lines of history
pub fn read_recent(dir: &Path, limit: usize) -> Result<HistoryPage> {
    let lines = history_lines(dir)?;
    let total = lines.len();
    let start = total.saturating_sub(limit);

    let entries = lines
        .iter()
        .enumerate()
        .skip(start)
        .filter_map(|(index, line)| {
            serde_json::from_str(line)
                .ok()
                .map(|document| HistoryEntry { index, document })
        })
        .collect();

    Ok(HistoryPage { total, entries })
}

/// The history line at `index`; `Ok(None)` if out of range or unreadable
pub fn read_entry(dir: &Path, index: usize) -> Result<Option<CaptureDocument>> {
    let lines = history_lines(dir)?;
    Ok(lines
        .get(index)
        .and_then(|line| serde_json::from_str(line).ok()))
}

fn history_lines(dir: &Path) -> Result<Vec<String>> {
    match std::fs::read_to_string(dir.join(HISTORY_FILE)) {
        Ok(text) => Ok(text.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(CaptureError::Io(e)),
    }
}
