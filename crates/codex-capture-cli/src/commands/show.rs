use std::fmt::Write as _;
use std::path::Path;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use codex_capture::capture::{CaptureDocument, read_entry};

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp};

#[derive(Parser)]
pub struct ShowCommand {
    #[clap(help = "History index (0-based line number, as listed by `history`)")]
    pub index: usize,
}

impl ShowCommand {
    pub fn execute(&self, dir: &Path, format: OutputFormat) -> CliResult<()> {
        let document = read_entry(dir, self.index)?
            .ok_or_else(|| format!("No readable capture at history index {}", self.index))?;
        println!("{}", render_document(&document, format)?);
        Ok(())
    }
}

/// Full view of one capture: summary table, then the reconstructed reply
pub(crate) fn render_document(document: &CaptureDocument, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(document)?);
    }

    let summary = &document.summary;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Field", "Value"]);

    table.add_row(["Seq".to_string(), document.seq.to_string()]);
    table.add_row(["Captured".to_string(), format_timestamp(&document.timestamp)]);
    table.add_row(["Request".to_string(), format!("{} {}", summary.method, document.request.url)]);
    table.add_row([
        "Model".to_string(),
        summary.model.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    table.add_row(["Status".to_string(), summary.status_code.to_string()]);
    table.add_row([
        "Stream".to_string(),
        match (summary.is_stream, summary.stream_complete) {
            (false, _) => "no".to_string(),
            (true, true) => "yes (complete)".to_string(),
            (true, false) => "yes (incomplete)".to_string(),
        },
    ]);
    table.add_row(["Duration".to_string(), format!("{} ms", summary.duration_ms)]);
    table.add_row(["Messages".to_string(), summary.messages_count.to_string()]);
    table.add_row(["System prompt".to_string(), format!("{} chars", summary.system_prompt_chars)]);
    table.add_row(["Tools offered".to_string(), summary.tools_count.to_string()]);
    if let Some(user) = &summary.last_user_message_preview {
        table.add_row(["Last user message".to_string(), user.clone()]);
    }

    let mut out = table.to_string();
    let preview = &document.preview;

    if !preview.reasoning.is_empty() {
        write!(out, "\n\nReasoning:\n{}", preview.reasoning).ok();
    }
    if !preview.content.is_empty() {
        write!(out, "\n\nContent:\n{}", preview.content).ok();
    }
    if !preview.tool_calls.is_empty() {
        out.push_str("\n\nTool calls:");
        for (i, call) in preview.tool_calls.iter().enumerate() {
            write!(out, "\n  [{i}] {}({})", call.name, call.arguments).ok();
        }
    }
    if preview.is_empty() {
        out.push_str("\n\n(no assistant output reconstructed)");
    }

    Ok(out)
}
