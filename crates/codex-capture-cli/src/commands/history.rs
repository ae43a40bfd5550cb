use std::path::Path;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use codex_capture::capture::{HistoryPage, read_recent};

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp, truncate_string};

#[derive(Parser)]
pub struct HistoryCommand {
    #[clap(
        long,
        short,
        default_value = "25",
        help = "Maximum number of captures to display"
    )]
    pub limit: usize,
}

impl HistoryCommand {
    pub fn execute(&self, dir: &Path, format: OutputFormat) -> CliResult<()> {
        let page = read_recent(dir, self.limit)?;
        println!("{}", render_page(&page, format)?);
        Ok(())
    }
}

fn render_page(page: &HistoryPage, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = page
                .entries
                .iter()
                .rev()
                .map(|entry| {
                    serde_json::json!({
                        "index": entry.index,
                        "seq": entry.document.seq,
                        "timestamp": entry.document.timestamp.to_rfc3339(),
                        "summary": &entry.document.summary,
                    })
                })
                .collect();
            let output = serde_json::json!({
                "total": page.total,
                "last_index": page.last_index(),
                "entries": entries,
            });
            Ok(serde_json::to_string_pretty(&output)?)
        }
        OutputFormat::Table => {
            if page.entries.is_empty() {
                return Ok("No captures found.".to_string());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(["#", "Captured", "Model", "Endpoint", "Status", "Stream", "Reply"]);

            for entry in page.entries.iter().rev() {
                let summary = &entry.document.summary;
                let reply = summary
                    .assistant_text_preview
                    .as_deref()
                    .or(summary.tool_call_names.first().map(String::as_str))
                    .unwrap_or("");
                table.add_row([
                    entry.index.to_string(),
                    format_timestamp(&entry.document.timestamp),
                    summary.model.clone().unwrap_or_else(|| "-".to_string()),
                    truncate_string(&summary.endpoint, 32),
                    summary.status_code.to_string(),
                    if summary.is_stream { "yes" } else { "no" }.to_string(),
                    truncate_string(reply, 40),
                ]);
            }

            Ok(format!(
                "{table}\n\nShowing {} of {} captures",
                page.entries.len(),
                page.total
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_history_table_lists_newest_first() {
        let temp = TempDir::new().unwrap();
        fixtures::record(temp.path(), &["a", "b", "c"]);

        let page = read_recent(temp.path(), 2).unwrap();
        let text = render_page(&page, OutputFormat::Table).unwrap();
        let row_2 = text.find("│ 2 ").unwrap();
        let row_1 = text.find("│ 1 ").unwrap();
        assert!(row_2 < row_1);
        assert!(!text.contains("│ 0 "));
        assert!(text.contains("Showing 2 of 3 captures"));
    }

    #[test]
    fn test_history_json() {
        let temp = TempDir::new().unwrap();
        fixtures::record(temp.path(), &["a", "b"]);

        let page = read_recent(temp.path(), 25).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&render_page(&page, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(value["total"], 2);
        assert_eq!(value["last_index"], 1);
        assert_eq!(value["entries"][0]["index"], 1);
        assert_eq!(value["entries"][0]["summary"]["model"], "gpt-oss:20b");
    }

    #[test]
    fn test_history_empty() {
        let temp = TempDir::new().unwrap();
        let page = read_recent(temp.path(), 25).unwrap();
        assert_eq!(
            render_page(&page, OutputFormat::Table).unwrap(),
            "No captures found."
        );
    }
}
