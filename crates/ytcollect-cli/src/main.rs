//! ytcollect - resumable YouTube channel, video and comment collector
//!
//! Collects the uploads of named channels and the comments of every video
//! into parquet-backed tables, checkpointing after each page so a run halted
//! by quota exhaustion resumes where it stopped.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "ytcollect")]
#[command(about = "Resumable YouTube channel, video and comment collector")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./ytcollect.toml or ~/.config/ytcollect/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the checkpoint (overrides config)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Collect channels, videos and comments, resuming from the last checkpoint
    Collect(cmd::collect::CollectArgs),
    /// Show what the checkpoint holds per channel
    Status,
    /// Write the collected tables as standalone parquet files
    Export(cmd::export::ExportArgs),
    /// List past runs from the run log
    Runs(cmd::runs::RunsArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.collect.data_dir.clone());

    // Progress context (TTY auto-detect)
    let progress = Arc::new(ytcollect_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress lines show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    // Collect runs also keep an audit log file.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    let log_file = match &cli.command {
        Command::Collect(args) => args.log_file(&config),
        _ => None,
    };
    ytcollect_core::init_logging(quiet, cli.debug, multi, log_file.as_deref())?;

    match &config.source {
        Some(path) => log::debug!("Loaded config from {}", path.display()),
        None => log::debug!("No config file found, using defaults"),
    }
    if let Some(path) = &log_file {
        log::debug!("Audit log: {}", path.display());
    }

    match cli.command {
        Command::Collect(args) => cmd::collect::run(args, &config, &data_dir, &progress),
        Command::Status => cmd::status::run(&config, &data_dir),
        Command::Export(args) => cmd::export::run(args, &config, &data_dir),
        Command::Runs(args) => cmd::runs::run(args, &data_dir),
        Command::Config => {
            cmd::print_config(&config, &data_dir);
            Ok(())
        }
    }
}
