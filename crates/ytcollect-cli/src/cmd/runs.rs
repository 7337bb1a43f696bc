//! `ytcollect runs` - past runs from the run log

use std::path::Path;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color};

use ytcollect_core::fmt_num;
use ytcollect_store::{RecordScope, RunLog, RunRecord, RunStatus};

use super::new_table;

#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Show the most recent N runs
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,

    /// Also list the per-channel records of each run
    #[arg(long)]
    pub channels: bool,
}

/// The last `limit` runs, oldest first, with their channel records when asked for
fn select(records: Vec<RunRecord>, limit: usize, channels: bool) -> Vec<RunRecord> {
    let mut run_ids: Vec<&str> = records
        .iter()
        .filter(|r| r.scope == RecordScope::Run)
        .map(|r| r.run_id.as_str())
        .collect();
    let skip = run_ids.len().saturating_sub(limit);
    run_ids.drain(..skip);
    let keep: Vec<String> = run_ids.into_iter().map(str::to_string).collect();

    records
        .into_iter()
        .filter(|r| keep.contains(&r.run_id))
        .filter(|r| channels || r.scope == RecordScope::Run)
        .collect()
}

pub fn run(args: RunsArgs, data_dir: &Path) -> Result<()> {
    let log = RunLog::in_dir(data_dir);
    let records = select(log.read_all()?, args.limit, args.channels);
    if records.is_empty() {
        eprintln!("No runs recorded in {}.", log.path().display());
        return Ok(());
    }

    let mut table = new_table(&[
        "Run", "Scope", "Status", "Started", "Elapsed", "Videos +", "Comments +", "Halted at",
    ]);
    for r in &records {
        let color = match r.status {
            RunStatus::Completed => Color::Green,
            RunStatus::QuotaExceeded | RunStatus::Interrupted => Color::Yellow,
            RunStatus::Error => Color::Red,
        };
        let scope = match r.scope {
            RecordScope::Run => "run".to_string(),
            RecordScope::Channel => r.channels.keys().cloned().collect::<Vec<_>>().join(", "),
        };
        let elapsed = (r.finished_at - r.started_at).num_seconds();
        let halted = r
            .halted_at
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| r.error.clone())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&r.run_id),
            Cell::new(scope),
            Cell::new(r.status).fg(color),
            Cell::new(r.started_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(format!("{elapsed}s")),
            Cell::new(fmt_num(r.total_videos_added())),
            Cell::new(fmt_num(r.total_comments_added())),
            Cell::new(halted),
        ]);
    }

    eprintln!("\n{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn record(run_id: &str, scope: RecordScope) -> RunRecord {
        let at = Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap();
        RunRecord {
            scope,
            run_id: run_id.into(),
            started_at: at,
            finished_at: at,
            status: RunStatus::Completed,
            channels: BTreeMap::new(),
            halted_at: None,
            error: None,
        }
    }

    #[test]
    fn keeps_last_runs_in_order() {
        let records = vec![
            record("r1", RecordScope::Channel),
            record("r1", RecordScope::Run),
            record("r2", RecordScope::Channel),
            record("r2", RecordScope::Run),
            record("r3", RecordScope::Channel),
            record("r3", RecordScope::Run),
        ];

        let runs = select(records.clone(), 2, false);
        let ids: Vec<_> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, ["r2", "r3"]);

        let with_channels = select(records.clone(), 1, true);
        assert_eq!(with_channels.len(), 2);
        assert_eq!(with_channels[0].scope, RecordScope::Channel);

        assert_eq!(select(records, 10, false).len(), 3);
    }
}
