use std::path::Path;

use clap::Parser;
use codex_capture::capture::read_latest;

use super::show::render_document;
use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct LatestCommand {
    #[clap(long, help = "Print the raw response body instead of the summary")]
    pub raw: bool,
}

impl LatestCommand {
    pub fn execute(&self, dir: &Path, format: OutputFormat) -> CliResult<()> {
        let Some(document) = read_latest(dir)? else {
            println!("No captures yet in {}", dir.display());
            return Ok(());
        };

        if self.raw {
            print!("{}", document.response.body_text);
            return Ok(());
        }

        println!("{}", render_document(&document, format)?);
        Ok(())
    }
}
