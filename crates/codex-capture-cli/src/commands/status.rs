use std::path::Path;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use codex_capture::capture::{
    HISTORY_FILE, LATEST_FILE, LATEST_REQUEST_FILE, LATEST_RESPONSE_FILE, read_latest, read_recent,
};

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp};

#[derive(Parser)]
pub struct StatusCommand {}

impl StatusCommand {
    pub fn execute(&self, dir: &Path, format: OutputFormat) -> CliResult<()> {
        let files: Vec<(&str, Option<u64>)> = [
            LATEST_FILE,
            LATEST_REQUEST_FILE,
            LATEST_RESPONSE_FILE,
            HISTORY_FILE,
        ]
        .into_iter()
        .map(|name| (name, file_size(&dir.join(name))))
        .collect();

        let history = read_recent(dir, usize::MAX)?;
        let readable = history.entries.len();
        let latest = read_latest(dir)?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "capture_dir": dir.display().to_string(),
                    "files": files
                        .iter()
                        .map(|(name, size)| serde_json::json!({"name": name, "size_bytes": size}))
                        .collect::<Vec<_>>(),
                    "history": {
                        "lines": history.total,
                        "readable": readable,
                        "unreadable": history.total - readable,
                    },
                    "latest": latest.as_ref().map(|doc| serde_json::json!({
                        "seq": doc.seq,
                        "timestamp": doc.timestamp.to_rfc3339(),
                        "model": &doc.summary.model,
                        "status_code": doc.summary.status_code,
                    })),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Capture directory: {}\n", dir.display());

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["File", "Size"]);
                for (name, size) in &files {
                    table.add_row([
                        name.to_string(),
                        size.map(format_size).unwrap_or_else(|| "missing".to_string()),
                    ]);
                }
                println!("{table}");

                println!(
                    "\nHistory: {} captures ({} unreadable)",
                    history.total,
                    history.total - readable
                );
                match latest {
                    Some(doc) => println!(
                        "Latest:  #{} at {} ({} -> {})",
                        doc.seq,
                        format_timestamp(&doc.timestamp),
                        doc.summary.model.as_deref().unwrap_or("-"),
                        doc.summary.status_code
                    ),
                    None => println!("Latest:  none"),
                }
            }
        }

        Ok(())
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
