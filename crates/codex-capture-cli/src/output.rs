use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Shorten `s` to at most `max_len` characters, ending in `...` when cut.
/// Newlines are flattened so a cell stays on one line.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let flat = s.replace(['\r', '\n'], " ");
    if flat.chars().count() <= max_len {
        flat
    } else {
        let kept: String = flat.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
