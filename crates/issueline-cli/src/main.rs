//! issueline - Checkpointed batch ingestion for issue-tracker projects
//!
//! Pulls paginated issues from a JIRA REST API, persists raw pages
//! durably, and re-emits them as normalized JSONL for downstream use.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::{Parser, Subcommand};

use issueline_core::{ProgressContext, init_logging, shutdown_flag};

mod cmd;
mod config;

use config::FileConfig;

#[derive(Parser)]
#[command(name = "issueline")]
#[command(about = "Checkpointed issue-tracker ingestion pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./issueline.toml or ~/.config/issueline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch raw issue pages, resuming from the last checkpoint
    Fetch(cmd::fetch::FetchArgs),
    /// Transform stored raw pages into normalized JSONL
    Transform(cmd::transform::TransformArgs),
    /// Full pipeline: fetch then transform
    Run(cmd::run::RunArgs),
    /// Show per-project checkpoint and output status
    Status(cmd::status::StatusArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — progress bars show activity
    //   non-TTY: info unless --debug          — logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = is_tty && !cli.debug;
    init_logging(quiet, cli.debug, multi);

    setup_signal_handler();

    let file_config = match load_config(cli.config.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args, file_config, &progress),
        Command::Transform(args) => cmd::transform::run(args, file_config, &progress),
        Command::Run(args) => cmd::run::run(args, file_config, &progress),
        Command::Status(args) => cmd::status::run(args, file_config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn load_config(path: Option<&std::path::PathBuf>) -> Result<FileConfig> {
    match path {
        Some(path) => FileConfig::from_file(path),
        None => FileConfig::load(),
    }
}

fn setup_signal_handler() {
    // First signal: set graceful shutdown flag
    // Second signal: force exit (default SIGINT behavior restored)
    // SAFETY: AtomicBool::store and process::exit are async-signal-safe
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGTERM, || {
            if shutdown_flag().swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .expect("Failed to register SIGTERM handler");
        signal_hook::low_level::register(signal_hook::consts::SIGINT, || {
            if shutdown_flag().swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .expect("Failed to register SIGINT handler");
    }
}
