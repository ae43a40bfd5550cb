//! codex-capture daemon - observational proxy that records LLM exchanges

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use codex_capture::capture::CaptureContext;
use codex_capture::config::Config;
use codex_capture::error::Result;
use codex_capture::proxy::ProxyServer;

/// codex-capture - record and reconstruct traffic between a CLI agent and a model server
#[derive(Parser)]
#[command(name = "codex-capture")]
#[command(about = "An observational proxy that captures and reconstructs LLM exchanges")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the capture proxy (default command)
    #[command(name = "serve")]
    Serve(ServeArgs),
}

#[derive(Args, Default)]
pub struct ServeArgs {
    /// Directory for capture artifacts (overrides config and CODEX_CAPTURE_DIR)
    #[arg(long)]
    pub capture_dir: Option<PathBuf>,

    /// Only capture requests whose URL contains this substring
    #[arg(long)]
    pub capture_filter: Option<String>,

    /// Address to listen on
    #[arg(long)]
    pub listen: Option<String>,

    /// Upstream model server for non-passthrough requests
    #[arg(long)]
    pub upstream: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None => serve(cli.config, ServeArgs::default()).await,
        Some(Command::Serve(args)) => serve(cli.config, args).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,codex_capture=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn apply_overrides(config: &mut Config, args: ServeArgs) {
    if let Some(dir) = args.capture_dir {
        config.capture.dir = Some(dir);
    }
    if let Some(filter) = args.capture_filter {
        config.capture.filter = filter;
    }
    if let Some(listen) = args.listen {
        config.proxy.listen_addr = listen;
    }
    if let Some(upstream) = args.upstream {
        config.proxy.upstream_url = Some(upstream);
    }
}

async fn serve(config_path: Option<PathBuf>, args: ServeArgs) -> Result<()> {
    tracing::info!("Starting codex-capture");

    let mut config = Config::load(config_path.as_deref())?;
    apply_overrides(&mut config, args);
    tracing::debug!("Config loaded: {:?}", config);

    // Directory problems stop startup here, before any flow is accepted
    let capture = Arc::new(CaptureContext::from_config(&config.capture)?);

    let server = ProxyServer::new(config.proxy, capture);
    server.serve().await
}
