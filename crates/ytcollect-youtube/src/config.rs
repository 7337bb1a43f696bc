//! What to collect: channels, date window, reply toggle and retry policy

use std::collections::HashSet;

use anyhow::{Context, bail, ensure};
use chrono::{DateTime, NaiveDate, Utc};
use ytcollect_core::RetryPolicy;

/// Videos between progress lines in the comment phase
pub const COMMENT_LOG_EVERY: usize = 50;

/// A requested channel: normalized display name and channel id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub id: String,
}

impl ChannelSpec {
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            name: normalize_channel_name(name),
            id: id.trim().to_string(),
        }
    }

    /// Parse `name=CHANNEL_ID`
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let (name, id) = s
            .split_once('=')
            .with_context(|| format!("expected NAME=CHANNEL_ID, got `{s}`"))?;
        let spec = Self::new(name, id);
        ensure!(!spec.name.is_empty(), "empty channel name in `{s}`");
        ensure!(!spec.id.is_empty(), "empty channel id in `{s}`");
        Ok(spec)
    }
}

/// Lowercase, with runs of whitespace replaced by `-` (`"RIA News"` → `ria-news`)
pub fn normalize_channel_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Channels in collection order
    pub channels: Vec<ChannelSpec>,
    /// Last publication date (inclusive) of collected videos
    pub cutoff: NaiveDate,
    /// First publication date (inclusive); `None` collects the whole history
    pub since: Option<NaiveDate>,
    /// Page through replies of threads that have any
    pub replies: bool,
    pub retry: RetryPolicy,
    pub comment_log_every: usize,
}

impl CollectConfig {
    pub fn new(channels: Vec<ChannelSpec>, cutoff: NaiveDate) -> Self {
        Self {
            channels,
            cutoff,
            since: None,
            replies: true,
            retry: RetryPolicy::default(),
            comment_log_every: COMMENT_LOG_EVERY,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for ch in &self.channels {
            ensure!(!ch.name.is_empty(), "channel {} has an empty name", ch.id);
            ensure!(!ch.id.is_empty(), "channel {} has an empty id", ch.name);
            if !names.insert(ch.name.as_str()) {
                bail!("duplicate channel name: {}", ch.name);
            }
            if !ids.insert(ch.id.as_str()) {
                bail!("duplicate channel id: {}", ch.id);
            }
        }
        if let Some(since) = self.since {
            ensure!(
                since <= self.cutoff,
                "since ({since}) is after cutoff ({})",
                self.cutoff
            );
        }
        ensure!(self.comment_log_every > 0, "comment_log_every must be positive");
        Ok(())
    }

    /// Whether a video published at `published_at` falls in the collection window
    pub fn in_window(&self, published_at: DateTime<Utc>) -> bool {
        let date = published_at.date_naive();
        date <= self.cutoff && self.since.is_none_or(|since| date >= since)
    }

    /// Whether a newest-first listing has gone past the window's lower bound
    pub fn predates_window(&self, published_at: DateTime<Utc>) -> bool {
        self.since
            .is_some_and(|since| published_at.date_naive() < since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_channel_name("RIA News"), "ria-news");
        assert_eq!(normalize_channel_name("  Sputnik   Live "), "sputnik-live");
        assert_eq!(normalize_channel_name("tass"), "tass");
    }

    #[test]
    fn parse_channel_spec() {
        let spec = ChannelSpec::parse("RIA News=UCdJ8LH2M3RZ").unwrap();
        assert_eq!(spec.name, "ria-news");
        assert_eq!(spec.id, "UCdJ8LH2M3RZ");
        assert!(ChannelSpec::parse("no-separator").is_err());
        assert!(ChannelSpec::parse("name=").is_err());
    }

    #[test]
    fn cutoff_is_inclusive() {
        let config = CollectConfig::new(vec![], date("2022-03-01"));
        assert!(config.in_window(at("2022-03-01T23:59:59Z")));
        assert!(!config.in_window(at("2022-03-02T00:00:00Z")));
        assert!(config.in_window(at("2010-01-01T00:00:00Z")));
        assert!(!config.predates_window(at("2010-01-01T00:00:00Z")));
    }

    #[test]
    fn since_bounds_window() {
        let mut config = CollectConfig::new(vec![], date("2022-03-01"));
        config.since = Some(date("2022-02-01"));
        assert!(config.in_window(at("2022-02-01T00:00:00Z")));
        assert!(!config.in_window(at("2022-01-31T23:59:59Z")));
        assert!(config.predates_window(at("2022-01-31T23:59:59Z")));
    }

    #[test]
    fn validate_rejects_duplicates() {
        let mut config = CollectConfig::new(
            vec![ChannelSpec::new("a", "UC1"), ChannelSpec::new("A", "UC2")],
            date("2022-03-01"),
        );
        assert!(config.validate().unwrap_err().to_string().contains("duplicate channel name"));

        config.channels[1] = ChannelSpec::new("b", "UC1");
        assert!(config.validate().unwrap_err().to_string().contains("duplicate channel id"));

        config.channels[1] = ChannelSpec::new("b", "UC2");
        config.since = Some(date("2023-01-01"));
        assert!(config.validate().is_err());
        config.since = None;
        assert!(config.validate().is_ok());
    }
}
