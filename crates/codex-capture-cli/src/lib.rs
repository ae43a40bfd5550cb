pub mod commands;
pub mod error;
pub mod output;

pub use commands::{HistoryCommand, LatestCommand, ShowCommand, StatusCommand};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, format_timestamp, truncate_string};
