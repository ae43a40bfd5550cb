use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use codex_capture::capture::output_dir;
use codex_capture::config::Config;
use codex_capture_cli::commands::{HistoryCommand, LatestCommand, ShowCommand, StatusCommand};
use codex_capture_cli::error::CliResult;
use codex_capture_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "codex-capture-cli")]
#[command(about = "codex-capture CLI - Inspect recorded LLM exchanges")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'd', global = true, help = "Path to capture directory")]
    pub dir: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Show the most recent capture")]
    Latest(LatestCommand),

    #[clap(about = "List recent captures")]
    History(HistoryCommand),

    #[clap(about = "Show one capture from history")]
    Show(ShowCommand),

    #[clap(about = "Show capture directory status")]
    Status(StatusCommand),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let dir = capture_dir(cli.dir.as_deref(), cli.config.as_deref())?;
    if !dir.is_dir() {
        return Err(format!("Capture directory does not exist: {}", dir.display()).into());
    }

    match &cli.command {
        Command::Latest(cmd) => cmd.execute(&dir, format),
        Command::History(cmd) => cmd.execute(&dir, format),
        Command::Show(cmd) => cmd.execute(&dir, format),
        Command::Status(cmd) => cmd.execute(&dir, format),
    }
}

/// Same resolution order as the proxy, without creating anything
fn capture_dir(explicit: Option<&Path>, config_path: Option<&Path>) -> CliResult<PathBuf> {
    let configured = match explicit {
        Some(dir) => Some(dir.to_path_buf()),
        None => Config::load(config_path)?.capture.dir,
    };
    let exe = std::env::current_exe()?;
    Ok(output_dir::resolve_from(
        configured.as_deref(),
        std::env::var_os(output_dir::CAPTURE_DIR_ENV),
        &exe,
    )?)
}
