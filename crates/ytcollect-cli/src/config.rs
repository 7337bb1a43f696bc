//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use ytcollect_core::RetryPolicy;
use ytcollect_youtube::{ChannelSpec, DEFAULT_BASE_URL};

/// Global configuration for ytcollect
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub collect: CollectSection,
    pub retry: RetryConfig,
    /// Channels in collection order
    pub channels: Vec<ChannelEntry>,
    /// File the config was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: std::env::var("YOUTUBE_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectSection {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub cutoff: Option<NaiveDate>,
    pub since: Option<NaiveDate>,
    pub replies: bool,
    pub compression_level: i32,
    pub comment_log_every: usize,
}

impl Default for CollectSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_dir: PathBuf::from("./logs"),
            cutoff: None,
            since: None,
            replies: true,
            compression_level: 3,
            comment_log_every: ytcollect_youtube::config::COMMENT_LOG_EVERY,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_ms: policy.base_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelEntry {
    pub name: String,
    pub id: String,
}

impl ChannelEntry {
    pub fn spec(&self) -> ChannelSpec {
        ChannelSpec::new(&self.name, &self.id)
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./ytcollect.toml (current directory)
    /// 2. ~/.config/ytcollect/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("ytcollect.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "ytcollect") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn channel_specs(&self) -> Vec<ChannelSpec> {
        self.channels.iter().map(ChannelEntry::spec).collect()
    }
}
