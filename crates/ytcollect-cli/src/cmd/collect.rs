//! Collect subcommand - page through channels, videos and comments

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Args;

use ytcollect_core::{RetryPolicy, SharedProgress, install_signal_handlers, log_file_name};
use ytcollect_store::{CheckpointStore, RunStatus};
use ytcollect_youtube::{ChannelSpec, CollectConfig, Collector, HttpClient};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Channel to collect as NAME=CHANNEL_ID (repeatable, replaces [[channels]])
    #[arg(long = "channel", value_parser = parse_channel)]
    pub channels: Vec<ChannelSpec>,

    /// Last publication date to collect, inclusive (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub cutoff: Option<NaiveDate>,

    /// First publication date to collect, inclusive (YYYY-MM-DD)
    #[arg(short, long, value_parser = parse_date)]
    pub since: Option<NaiveDate>,

    /// Skip replies, collect top-level comments only
    #[arg(long)]
    pub no_replies: bool,

    /// Zstd compression level (1-22)
    #[arg(short, long)]
    pub zstd_level: Option<i32>,

    /// Maximum retry attempts for transient failures
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Audit log file (default: <log_dir>/log-ytcollect-YYMMDD_HHMM.log)
    #[arg(long, conflicts_with = "no_log_file")]
    pub log_file: Option<PathBuf>,

    /// Do not write an audit log file
    #[arg(long)]
    pub no_log_file: bool,
}

impl CollectArgs {
    /// Where this run's audit log goes, if anywhere
    pub fn log_file(&self, config: &Config) -> Option<PathBuf> {
        if self.no_log_file {
            return None;
        }
        Some(
            self.log_file
                .clone()
                .unwrap_or_else(|| config.collect.log_dir.join(log_file_name())),
        )
    }

    /// Merge CLI flags over the config file into a collection config.
    fn collect_config(&self, config: &Config) -> Result<CollectConfig> {
        let channels = if self.channels.is_empty() {
            config.channel_specs()
        } else {
            self.channels.clone()
        };
        if channels.is_empty() {
            bail!("No channels to collect: add [[channels]] to the config or pass --channel NAME=ID");
        }

        let Some(cutoff) = self.cutoff.or(config.collect.cutoff) else {
            bail!("No cutoff date: set [collect] cutoff or pass --cutoff YYYY-MM-DD");
        };

        let mut collect = CollectConfig::new(channels, cutoff);
        collect.since = self.since.or(config.collect.since);
        collect.replies = config.collect.replies && !self.no_replies;
        collect.comment_log_every = config.collect.comment_log_every;
        collect.retry = match self.max_retries {
            Some(n) => RetryPolicy::new(n, config.retry.policy().base_delay),
            None => config.retry.policy(),
        };
        collect.validate()?;
        Ok(collect)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date format: {e}"))
}

fn parse_channel(s: &str) -> Result<ChannelSpec, String> {
    ChannelSpec::parse(s).map_err(|e| e.to_string())
}

pub fn run(
    args: CollectArgs,
    config: &Config,
    data_dir: &Path,
    progress: &SharedProgress,
) -> Result<()> {
    let collect = args.collect_config(config)?;
    let zstd_level = args.zstd_level.unwrap_or(config.collect.compression_level);

    let Some(api_key) = config.api.key.as_deref() else {
        bail!("YouTube API key not set: export YOUTUBE_API_KEY or set [api] key");
    };
    let client = HttpClient::new(
        api_key,
        &config.api.base_url,
        Duration::from_secs(config.api.timeout_secs),
    )?;

    install_signal_handlers().context("Failed to install signal handlers")?;

    log::info!("Collecting {} channels", collect.channels.len());
    log::info!("  Data: {}", data_dir.display());
    log::info!("  Cutoff: {}", collect.cutoff);
    if let Some(since) = collect.since {
        log::info!("  Since: {since}");
    }

    let (store, state) = CheckpointStore::open(data_dir, zstd_level)
        .with_context(|| format!("Failed to open checkpoint in {}", data_dir.display()))?;
    let mut collector =
        Collector::new(client, collect, store, state).with_progress(progress.clone());
    let report = collector.collect()?;

    if progress.is_tty() {
        eprintln!("{}", report.format_table());
    } else {
        report.log();
    }

    match report.status {
        RunStatus::Completed => Ok(()),
        RunStatus::QuotaExceeded | RunStatus::Interrupted => {
            log::warn!("Run {} {}; run again to resume", report.run_id, report.status);
            Ok(())
        }
        RunStatus::Error => bail!(
            "Run {} failed: {}",
            report.run_id,
            report.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
