pub mod collect;
pub mod export;
pub mod runs;
pub mod status;

use std::path::Path;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

/// Table with the shared look of every ytcollect listing
pub(crate) fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            header
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    table
}

pub(crate) fn print_config(config: &Config, data_dir: &Path) {
    let mut table = new_table(&["Setting", "Value"]);

    let source = config
        .source
        .as_ref()
        .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
    table.add_row(vec!["Config file", &source]);
    table.add_row(vec!["Data directory", &data_dir.display().to_string()]);
    table.add_row(vec![
        "Log directory",
        &config.collect.log_dir.display().to_string(),
    ]);
    table.add_row(vec!["API base URL", &config.api.base_url]);
    table.add_row(vec![
        "API key",
        if config.api.key.is_some() {
            "configured"
        } else {
            "not set"
        },
    ]);
    table.add_row(vec!["Timeout", &format!("{}s", config.api.timeout_secs)]);
    table.add_row(vec![
        "Cutoff",
        &config
            .collect
            .cutoff
            .map_or_else(|| "not set".to_string(), |d| d.to_string()),
    ]);
    table.add_row(vec![
        "Since",
        &config
            .collect
            .since
            .map_or_else(|| "whole history".to_string(), |d| d.to_string()),
    ]);
    table.add_row(vec!["Replies", &config.collect.replies.to_string()]);
    table.add_row(vec![
        "Compression level",
        &config.collect.compression_level.to_string(),
    ]);
    table.add_row(vec![
        "Retries",
        &format!(
            "{} (base delay {}ms)",
            config.retry.max_retries, config.retry.base_delay_ms
        ),
    ]);
    let channels = config
        .channels
        .iter()
        .map(|c| format!("{} = {}", c.spec().name, c.id))
        .collect::<Vec<_>>()
        .join("\n");
    table.add_row(vec![
        "Channels",
        if channels.is_empty() {
            "none"
        } else {
            channels.as_str()
        },
    ]);

    eprintln!("\n{table}");
}
