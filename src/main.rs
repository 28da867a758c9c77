//! filemcp - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::Colorize;
use filemcp::cli::{Args, Config};
use filemcp::logging::init_logging;
use filemcp::server::{McpServer, ProtocolLog};
use filemcp::tools::ToolRuntime;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(msg) = args.validate() {
        eprintln!("{} {}", "error:".red().bold(), msg);
        eprintln!("{}", Args::command().render_help());
        std::process::exit(1);
    }

    if let Err(e) = run(args).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    config.apply_args(&args);
    config.validate()?;

    init_logging(&config.logging)?;

    let argv: Vec<String> = std::env::args().collect();
    info!(
        cmd = %argv.first().map(String::as_str).unwrap_or("filemcp"),
        args = ?argv.get(1..).unwrap_or_default(),
        pid = std::process::id(),
        "starting"
    );

    let root = args.root_dir().context("Invalid root directory")?;
    let runtime = ToolRuntime::with_strategy(&root, config.confinement.strategy)?;
    info!(
        root = %runtime.root().display(),
        strategy = %runtime.strategy(),
        "serving on stdio"
    );

    let mut server = McpServer::new(runtime, &config.server.name, &config.server.version);
    if let Some(path) = config.logging.protocol_log_path() {
        match ProtocolLog::open(&path) {
            Ok(log) => server = server.with_protocol_log(log),
            Err(e) => warn!(path = %path.display(), error = %e, "protocol log unavailable"),
        }
    }

    let outcome = server.serve_stdio().await;

    info!(pid = std::process::id(), "exiting");
    outcome?;
    Ok(())
}
