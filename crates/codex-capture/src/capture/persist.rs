//! Durable capture output
//!
//! Each capture replaces the `latest.*` snapshot and appends one line to
//! `history.jsonl`. Both happen under a single writer lock:
//! - the three snapshot files are staged as temp files in the capture
//!   directory, fsynced, and only then renamed over their targets
//!   (`latest.json` last, so it never names an exchange whose other files
//!   are still pending)
//! - history lines are written with one append, then flushed and synced
//!
//! Snapshot and history failures are reported separately and never poison
//! the writer for the next capture.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::document::CaptureDocument;
use super::exchange::Exchange;
use crate::error::{CaptureError, Result};

pub const LATEST_FILE: &str = "latest.json";
pub const LATEST_REQUEST_FILE: &str = "latest.request.json";
pub const LATEST_RESPONSE_FILE: &str = "latest.response.txt";
pub const HISTORY_FILE: &str = "history.jsonl";

/// Outcome of persisting one capture
#[derive(Debug)]
pub struct PersistReport {
    pub seq: u64,
    pub snapshot: Result<()>,
    pub history: Result<()>,
}

impl PersistReport {
    pub fn is_ok(&self) -> bool {
        self.snapshot.is_ok() && self.history.is_ok()
    }
}

struct WriterState {
    next_seq: u64,
}

/// Single-writer owner of the capture directory's files
pub struct Persister {
    dir: PathBuf,
    writer: Mutex<WriterState>,
}

impl Persister {
    /// Open a persister over an existing directory.
    ///
    /// Sequence numbers continue after the highest one already in history.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let next_seq = next_seq_from_history(&dir.join(HISTORY_FILE));
        debug!(
            "Persister ready in {} (next seq {})",
            dir.display(),
            next_seq
        );
        Self {
            dir,
            writer: Mutex::new(WriterState { next_seq }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stamp `document` with the next sequence number and the current time,
    /// then write the snapshot and append history.
    pub fn persist(&self, exchange: &Exchange, mut document: CaptureDocument) -> PersistReport {
        let mut state = self.writer.lock();

        let seq = state.next_seq;
        state.next_seq += 1;
        document.seq = seq;
        document.timestamp = Utc::now();

        let snapshot = self.write_snapshot(exchange, &document);
        if let Err(e) = &snapshot {
            warn!("Capture #{} snapshot not written: {}", seq, e);
        }

        let history = self.append_history(&document);
        if let Err(e) = &history {
            warn!("Capture #{} not appended to history: {}", seq, e);
        }

        PersistReport {
            seq,
            snapshot,
            history,
        }
    }

    fn write_snapshot(&self, exchange: &Exchange, document: &CaptureDocument) -> Result<()> {
        let mut combined = serde_json::to_vec_pretty(document)?;
        combined.push(b'\n');

        let request_artifact = match exchange.request_json() {
            Some(json) if json.is_object() => {
                let mut pretty = serde_json::to_vec_pretty(json)?;
                pretty.push(b'\n');
                pretty
            }
            _ => exchange.request().body.clone(),
        };

        // Stage everything before replacing anything
        let staged = [
            (
                LATEST_RESPONSE_FILE,
                self.stage(&exchange.response().body)?,
            ),
            (LATEST_REQUEST_FILE, self.stage(&request_artifact)?),
            (LATEST_FILE, self.stage(&combined)?),
        ];

        for (name, tmp) in staged {
            let path = self.dir.join(name);
            tmp.persist(&path)
                .map_err(|e| CaptureError::persist(&path, e.error))?;
        }
        Ok(())
    }

    fn stage(&self, contents: &[u8]) -> Result<NamedTempFile> {
        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|e| CaptureError::persist(&self.dir, e))?;
        tmp.write_all(contents)
            .map_err(|e| CaptureError::persist(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| CaptureError::persist(tmp.path(), e))?;
        Ok(tmp)
    }

    fn append_history(&self, document: &CaptureDocument) -> Result<()> {
        let path = self.dir.join(HISTORY_FILE);
        let mut line = serde_json::to_string(document)?;
        line.push('\n');
        append_line(&path, line.as_bytes()).map_err(|e| CaptureError::persist(&path, e))
    }
}

fn append_line(path: &Path, line: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    // A torn final line from an earlier crash must not swallow this record
    if ends_without_newline(&mut file)? {
        file.write_all(b"\n")?;
    }

    file.write_all(line)?;
    file.flush()?;
    file.sync_data()
}

fn ends_without_newline(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[derive(Deserialize)]
struct SeqOnly {
    seq: u64,
}

fn next_seq_from_history(path: &Path) -> u64 {
    let Ok(file) = File::open(path) else {
        return 0;
    };
    BufReader::new(file)
        .lines()
        .map_while(std::result::Result::ok)
        .filter_map(|line| serde_json::from_str::<SeqOnly>(&line).ok())
        .map(|record| record.seq + 1)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::reconstruct::ReconstructedPreview;
    use crate::capture::summary::CaptureSummary;
    use crate::testing::ExchangeBuilder;
    use tempfile::TempDir;

    fn document_for(exchange: &Exchange) -> CaptureDocument {
        CaptureDocument::new(
            exchange,
            CaptureSummary::default(),
            ReconstructedPreview::default(),
            None,
        )
    }

    fn history_lines(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join(HISTORY_FILE))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_writes_all_artifacts() {
        let temp = TempDir::new().unwrap();
        let persister = Persister::new(temp.path());
        let exchange = ExchangeBuilder::new()
            .request_body(r#"{"model":"m"}"#)
            .response_body("data: {\"delta\":\"x\"}\n\n")
            .build();

        let report = persister.persist(&exchange, document_for(&exchange));
        assert!(report.is_ok());
        assert_eq!(report.seq, 0);

        let latest: CaptureDocument = serde_json::from_str(
            &std::fs::read_to_string(temp.path().join(LATEST_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(latest.seq, 0);

        let request: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(temp.path().join(LATEST_REQUEST_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(request["model"], "m");

        assert_eq!(
            std::fs::read(temp.path().join(LATEST_RESPONSE_FILE)).unwrap(),
            b"data: {\"delta\":\"x\"}\n\n"
        );
        assert_eq!(history_lines(temp.path()).len(), 1);
    }

    #[test]
    fn test_response_bytes_written_verbatim() {
        let temp = TempDir::new().unwrap();
        let persister = Persister::new(temp.path());
        let raw = b"caf\xc3\x83\xc2\xa9 \xff\xfe not utf8".to_vec();
        let exchange = ExchangeBuilder::new().response_bytes(raw.clone()).build();

        persister.persist(&exchange, document_for(&exchange));

        assert_eq!(std::fs::read(temp.path().join(LATEST_RESPONSE_FILE)).unwrap(), raw);
    }

    #[test]
    fn test_non_json_request_written_raw() {
        let temp = TempDir::new().unwrap();
        let persister = Persister::new(temp.path());
        let exchange = ExchangeBuilder::new().request_body("model=raw").build();

        persister.persist(&exchange, document_for(&exchange));

        assert_eq!(
            std::fs::read_to_string(temp.path().join(LATEST_REQUEST_FILE)).unwrap(),
            "model=raw"
        );
    }

    #[test]
    fn test_history_appends_in_sequence() {
        let temp = TempDir::new().unwrap();
        let persister = Persister::new(temp.path());

        for _ in 0..3 {
            let exchange = ExchangeBuilder::new().build();
            persister.persist(&exchange, document_for(&exchange));
        }

        let seqs: Vec<u64> = history_lines(temp.path())
            .iter()
            .map(|line| serde_json::from_str::<CaptureDocument>(line).unwrap().seq)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_sequence_resumes_after_existing_history() {
        let temp = TempDir::new().unwrap();
        {
            let persister = Persister::new(temp.path());
            for _ in 0..2 {
                let exchange = ExchangeBuilder::new().build();
                persister.persist(&exchange, document_for(&exchange));
            }
        }

        let persister = Persister::new(temp.path());
        let exchange = ExchangeBuilder::new().build();
        let report = persister.persist(&exchange, document_for(&exchange));
        assert_eq!(report.seq, 2);
    }

    #[test]
    fn test_torn_history_line_does_not_merge_with_next() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(HISTORY_FILE), "{\"seq\":0,\"trunc").unwrap();

        let persister = Persister::new(temp.path());
        let exchange = ExchangeBuilder::new().build();
        persister.persist(&exchange, document_for(&exchange));

        let lines = history_lines(temp.path());
        assert_eq!(lines.len(), 2);
        assert!(serde_json::from_str::<CaptureDocument>(&lines[1]).is_ok());
    }

    #[test]
    fn test_snapshot_failure_is_reported_and_history_still_written() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(LATEST_FILE)).unwrap();

        let persister = Persister::new(temp.path());
        let exchange = ExchangeBuilder::new().build();
        let report = persister.persist(&exchange, document_for(&exchange));

        assert!(matches!(report.snapshot, Err(CaptureError::Persist { .. })));
        assert!(report.history.is_ok());
        assert_eq!(history_lines(temp.path()).len(), 1);
    }

    #[test]
    fn test_history_failure_is_reported_and_snapshot_still_written() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(HISTORY_FILE)).unwrap();

        let persister = Persister::new(temp.path());
        let exchange = ExchangeBuilder::new().build();
        let report = persister.persist(&exchange, document_for(&exchange));

        assert!(report.snapshot.is_ok());
        assert!(matches!(report.history, Err(CaptureError::Persist { .. })));
        assert!(temp.path().join(LATEST_FILE).is_file());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(LATEST_FILE)).unwrap();
        let persister = Persister::new(temp.path());
        let exchange = ExchangeBuilder::new().build();
        persister.persist(&exchange, document_for(&exchange));

        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".tmp"))
            .collect();
        assert!(names.is_empty(), "leftover temp files: {names:?}");
    }
}
