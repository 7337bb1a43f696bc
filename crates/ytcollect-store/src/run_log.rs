//! Append-only audit log of collection runs (`runs.jsonl`)

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cursor::CursorKind;

pub const RUN_LOG_FILE: &str = "runs.jsonl";

/// How a run (or one channel of it) ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Completed,
    QuotaExceeded,
    Error,
    Interrupted,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::QuotaExceeded => "quota-exceeded",
            Self::Error => "error",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn is_halt(self) -> bool {
        self != Self::Completed
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a record covers a whole invocation or a single channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordScope {
    Run,
    Channel,
}

/// Per-channel counters of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounts {
    /// Videos merged by this run
    pub videos_added: usize,
    /// Comments (top-level and replies) merged by this run
    pub comments_added: usize,
    /// Videos held for the channel after this run
    pub videos_total: usize,
    /// Videos of the channel with comments disabled
    pub comments_disabled: usize,
}

/// The listing a halted run stopped in; its cursor is where the next run resumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltPoint {
    pub channel: String,
    pub kind: CursorKind,
    pub parent_id: String,
}

impl fmt::Display for HaltPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.kind, self.parent_id, self.channel)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub scope: RecordScope,
    /// Shared by every record of one invocation
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub channels: BTreeMap<String, ChannelCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<HaltPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunRecord {
    /// Start time in compact UTC form, down to the microsecond
    pub fn new_run_id(started_at: DateTime<Utc>) -> String {
        started_at.format("%Y%m%dT%H%M%S%.6fZ").to_string()
    }

    pub fn total_videos_added(&self) -> usize {
        self.channels.values().map(|c| c.videos_added).sum()
    }

    pub fn total_comments_added(&self) -> usize {
        self.channels.values().map(|c| c.comments_added).sum()
    }
}

/// Writer and reader for the run log file
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Run log inside a data directory
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(RUN_LOG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Failures are logged and reported as `false`;
    /// a missing audit line never aborts a collection.
    pub fn record(&self, record: &RunRecord) -> bool {
        match self.append(record) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to append run record to {}: {e:#}", self.path.display());
                false
            }
        }
    }

    fn append(&self, record: &RunRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).context("failed to serialize run record")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    /// All records in append order; a torn trailing line is skipped.
    pub fn read_all(&self) -> Result<Vec<RunRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;

        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let mut records = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) if i + 1 == lines.len() && !content.ends_with('\n') => {
                    log::warn!("Ignoring truncated last line of {}: {e}", self.path.display());
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("invalid record on line {} of {}", i + 1, self.path.display())
                    });
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: RunStatus) -> RunRecord {
        let started_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut channels = BTreeMap::new();
        channels.insert(
            "ria-news".to_string(),
            ChannelCounts {
                videos_added: 3,
                comments_added: 0,
                videos_total: 3,
                comments_disabled: 3,
            },
        );
        RunRecord {
            scope: RecordScope::Run,
            run_id: RunRecord::new_run_id(started_at),
            started_at,
            finished_at: started_at,
            status,
            channels,
            halted_at: None,
            error: None,
        }
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&RunStatus::QuotaExceeded).unwrap();
        assert_eq!(json, "\"quota-exceeded\"");
        assert_eq!(RunStatus::QuotaExceeded.to_string(), "quota-exceeded");
        assert!(!RunStatus::Completed.is_halt());
    }

    #[test]
    fn run_ids_distinguish_runs_within_a_second() {
        let first: DateTime<Utc> = "2022-03-01T12:00:00.250Z".parse().unwrap();
        let second: DateTime<Utc> = "2022-03-01T12:00:00.750001Z".parse().unwrap();
        assert_eq!(RunRecord::new_run_id(first), "20220301T120000.250000Z");
        assert_eq!(RunRecord::new_run_id(second), "20220301T120000.750001Z");
        assert_eq!(
            RunRecord::new_run_id(DateTime::from_timestamp(1_700_000_000, 0).unwrap()),
            "20231114T221320.000000Z"
        );
    }

    #[test]
    fn records_append_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::in_dir(dir.path());
        assert!(log.read_all().unwrap().is_empty());

        assert!(log.record(&record(RunStatus::QuotaExceeded)));
        let mut done = record(RunStatus::Completed);
        done.halted_at = None;
        assert!(log.record(&done));

        let all = log.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].status, RunStatus::QuotaExceeded);
        assert_eq!(all[1], done);
        assert_eq!(all[1].total_videos_added(), 3);
    }

    #[test]
    fn halt_point_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::in_dir(dir.path());
        let mut halted = record(RunStatus::QuotaExceeded);
        halted.halted_at = Some(HaltPoint {
            channel: "sputnik".into(),
            kind: CursorKind::CommentThreads,
            parent_id: "vid42".into(),
        });
        log.record(&halted);

        let back = log.read_all().unwrap();
        assert_eq!(back[0].halted_at, halted.halted_at);
        assert_eq!(
            back[0].halted_at.as_ref().unwrap().to_string(),
            "comment_threads:vid42 (sputnik)"
        );
    }

    #[test]
    fn truncated_last_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::in_dir(dir.path());
        log.record(&record(RunStatus::Completed));
        let mut f = OpenOptions::new().append(true).open(log.path()).unwrap();
        f.write_all(b"{\"scope\":\"run\",\"run_").unwrap();

        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn corrupt_middle_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::in_dir(dir.path());
        fs::write(log.path(), "garbage\n").unwrap();
        log.record(&record(RunStatus::Completed));
        assert!(log.read_all().is_err());
    }

    #[test]
    fn unwritable_log_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("missing").join("runs.jsonl"));
        assert!(!log.record(&record(RunStatus::Error)));
    }
}
