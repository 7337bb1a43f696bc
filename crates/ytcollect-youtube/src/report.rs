//! End-of-run report and the progress lines printed while collecting

use std::time::Duration;

use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use ytcollect_core::fmt_num;
use ytcollect_store::{ChannelCounts, EntityCounts, HaltPoint, RunStatus};

pub fn videos_progress_line(collected: usize, total: Option<u64>, channel: &str) -> String {
    match total {
        Some(total) => format!("{collected}/{total} videos collected for channel = {channel}"),
        None => format!("{collected} videos collected for channel = {channel}"),
    }
}

pub fn comments_progress_line(done: usize, total: usize, channel: &str) -> String {
    format!("Comments collected from {done}/{total} videos for channel = {channel}")
}

/// Outcome of one channel within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub name: String,
    pub channel_id: String,
    pub status: RunStatus,
    pub counts: ChannelCounts,
}

/// What `collect()` returns: how the run ended and what it added.
#[derive(Debug, Clone)]
pub struct CollectReport {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Channels reached by this run, in collection order
    pub channels: Vec<ChannelSummary>,
    pub halted_at: Option<HaltPoint>,
    pub error: Option<String>,
    /// Table sizes after the run
    pub totals: EntityCounts,
}

impl CollectReport {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn videos_added(&self) -> usize {
        self.channels.iter().map(|c| c.counts.videos_added).sum()
    }

    pub fn comments_added(&self) -> usize {
        self.channels.iter().map(|c| c.counts.comments_added).sum()
    }

    pub fn elapsed(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Channel")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Status").fg(Color::Cyan),
                Cell::new("Videos +").fg(Color::Cyan),
                Cell::new("Videos").fg(Color::Cyan),
                Cell::new("Comments +").fg(Color::Cyan),
                Cell::new("Disabled").fg(Color::Cyan),
            ]);

        for ch in &self.channels {
            let color = match ch.status {
                RunStatus::Completed => Color::Green,
                RunStatus::QuotaExceeded | RunStatus::Interrupted => Color::Yellow,
                RunStatus::Error => Color::Red,
            };
            table.add_row(vec![
                Cell::new(&ch.name),
                Cell::new(ch.status).fg(color),
                Cell::new(fmt_num(ch.counts.videos_added)),
                Cell::new(fmt_num(ch.counts.videos_total)),
                Cell::new(fmt_num(ch.counts.comments_added)),
                Cell::new(fmt_num(ch.counts.comments_disabled)),
            ]);
        }
        table.add_row(vec![
            Cell::new("Total").add_attribute(comfy_table::Attribute::Bold),
            Cell::new(self.status),
            Cell::new(fmt_num(self.videos_added())),
            Cell::new(fmt_num(self.totals.videos)),
            Cell::new(fmt_num(self.comments_added())),
            Cell::new(""),
        ]);

        let mut out = format!("\n{table}");
        if let Some(at) = &self.halted_at {
            out.push_str(&format!("\nHalted at {at}; run again to resume"));
        }
        if let Some(err) = &self.error {
            out.push_str(&format!("\nError: {err}"));
        }
        out
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "Run {} {}: +{} videos, +{} comments in {:.1?} ({} videos, {} comments total)",
            self.run_id,
            self.status,
            fmt_num(self.videos_added()),
            fmt_num(self.comments_added()),
            self.elapsed(),
            fmt_num(self.totals.videos),
            fmt_num(self.totals.comments)
        );
        if let Some(at) = &self.halted_at {
            log::warn!("Halted at {at}; run again to resume");
        }
    }
}
