//! `ytcollect export` - write the collected tables as standalone parquet files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;

use ytcollect_core::fmt_num;
use ytcollect_store::{CheckpointStore, export_tables};

use super::new_table;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output directory for channels.parquet, videos.parquet and comments.parquet
    #[arg(short, long)]
    pub output: PathBuf,

    /// Zstd compression level (1-22)
    #[arg(short, long)]
    pub zstd_level: Option<i32>,
}

pub fn run(args: ExportArgs, config: &Config, data_dir: &Path) -> Result<()> {
    let zstd_level = args.zstd_level.unwrap_or(config.collect.compression_level);
    let state = CheckpointStore::read_state(data_dir)
        .with_context(|| format!("Failed to load checkpoint in {}", data_dir.display()))?;

    let tables = export_tables(&state.accumulator, &args.output, zstd_level)?;

    let mut table = new_table(&["Table", "Rows", "File"]);
    for t in &tables {
        table.add_row(vec![
            Cell::new(t.kind),
            Cell::new(fmt_num(t.rows)),
            Cell::new(t.path.display()),
        ]);
    }
    eprintln!("\n{table}");
    Ok(())
}
