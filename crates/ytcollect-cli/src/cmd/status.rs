//! `ytcollect status` - what the checkpoint holds per channel

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color};

use ytcollect_core::fmt_num;
use ytcollect_store::{
    Channel, CheckpointStore, CollectionState, CursorKind, EntityKind, Manifest,
};

use super::new_table;
use crate::config::Config;

/// Progress of one channel as recorded in the checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChannelStatus {
    name: String,
    channel_id: String,
    /// Whether the channel was resolved by any run yet
    started: bool,
    uploads_done: bool,
    videos: usize,
    /// Videos whose comment listing is fully paged
    comments_done: usize,
    comments: usize,
    disabled: usize,
}

/// Stored channels in collection order, then configured channels not reached yet
fn channel_statuses(state: &CollectionState, config: &Config) -> Vec<ChannelStatus> {
    let acc = &state.accumulator;
    let mut rows: Vec<ChannelStatus> = acc
        .channels()
        .iter()
        .map(|ch| {
            let mut row = ChannelStatus {
                name: ch.name.clone(),
                channel_id: ch.channel_id.clone(),
                started: true,
                uploads_done: state
                    .cursors
                    .is_exhausted(CursorKind::Uploads, &ch.channel_id),
                videos: 0,
                comments_done: 0,
                comments: 0,
                disabled: 0,
            };
            for video in acc.videos_of(&ch.channel_id) {
                row.videos += 1;
                row.comments += acc.comments_of(&video.video_id).count();
                if state
                    .cursors
                    .is_exhausted(CursorKind::CommentThreads, &video.video_id)
                {
                    row.comments_done += 1;
                }
                if state.comments_disabled.contains(&video.video_id) {
                    row.disabled += 1;
                }
            }
            row
        })
        .collect();

    for spec in config.channel_specs() {
        if acc.get::<Channel>(&spec.id).is_none() {
            rows.push(ChannelStatus {
                name: spec.name,
                channel_id: spec.id,
                started: false,
                uploads_done: false,
                videos: 0,
                comments_done: 0,
                comments: 0,
                disabled: 0,
            });
        }
    }
    rows
}

pub fn run(config: &Config, data_dir: &Path) -> Result<()> {
    let Some(manifest) = Manifest::read(data_dir)? else {
        eprintln!("No checkpoint in {}.", data_dir.display());
        return Ok(());
    };
    let state = CheckpointStore::read_state(data_dir)
        .with_context(|| format!("Failed to load checkpoint in {}", data_dir.display()))?;

    let mut table = new_table(&[
        "Channel",
        "Id",
        "Uploads",
        "Videos",
        "Comment listings",
        "Comments",
        "Disabled",
    ]);
    for row in channel_statuses(&state, config) {
        let uploads = if !row.started {
            Cell::new("not started").fg(Color::DarkGrey)
        } else if row.uploads_done {
            Cell::new("done").fg(Color::Green)
        } else {
            Cell::new("pending").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(&row.name),
            Cell::new(&row.channel_id),
            uploads,
            Cell::new(fmt_num(row.videos)),
            Cell::new(format!(
                "{}/{}",
                fmt_num(row.comments_done),
                fmt_num(row.videos)
            )),
            Cell::new(fmt_num(row.comments)),
            Cell::new(fmt_num(row.disabled)),
        ]);
    }

    eprintln!("\n{table}");
    eprintln!(
        "Generation {} ({} segments, updated {}): {} channels, {} videos, {} comments",
        manifest.generation,
        manifest.segments.len(),
        manifest.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        fmt_num(manifest.rows(EntityKind::Channels)),
        fmt_num(manifest.rows(EntityKind::Videos)),
        fmt_num(manifest.rows(EntityKind::Comments)),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ytcollect_store::{Comment, Video};

    fn video(id: &str, channel: &str) -> Video {
        Video {
            video_id: id.into(),
            channel_id: channel.into(),
            published_at: Utc.with_ymd_and_hms(2022, 2, 1, 0, 0, 0).unwrap(),
            title: id.into(),
            description: String::new(),
            duration: None,
            dimension: None,
            view_count: None,
            like_count: None,
            favorite_count: None,
            comment_count: None,
            region_blocked: Vec::new(),
        }
    }

    fn comment(id: &str, video: &str) -> Comment {
        let at = Utc.with_ymd_and_hms(2022, 2, 2, 0, 0, 0).unwrap();
        Comment {
            comment_id: id.into(),
            video_id: video.into(),
            thread_id: id.into(),
            parent_id: None,
            author: "a".into(),
            author_channel_id: None,
            author_channel_url: None,
            author_profile_image_url: None,
            text: "hi".into(),
            text_original: "hi".into(),
            like_count: 0,
            published_at: at,
            updated_at: at,
            total_reply_count: Some(0),
        }
    }

    #[test]
    fn summarizes_stored_and_pending_channels() {
        let mut state = CollectionState::default();
        state.accumulator.merge(vec![Channel {
            channel_id: "UC1".into(),
            name: "ria-news".into(),
            title: Some("RIA".into()),
            uploads_playlist_id: Some("UU1".into()),
        }]);
        state
            .accumulator
            .merge(vec![video("v1", "UC1"), video("v2", "UC1"), video("v3", "UC1")]);
        state
            .accumulator
            .merge(vec![comment("c1", "v1"), comment("c2", "v1")]);
        state.cursors.mark_exhausted(CursorKind::Uploads, "UC1");
        state.cursors.mark_exhausted(CursorKind::CommentThreads, "v1");
        state.cursors.mark_exhausted(CursorKind::CommentThreads, "v2");
        state.comments_disabled.insert("v2".into());

        let config: Config = toml::from_str(
            "[[channels]]\nname = \"RIA News\"\nid = \"UC1\"\n\n[[channels]]\nname = \"Sputnik\"\nid = \"UC2\"\n",
        )
        .unwrap();

        let rows = channel_statuses(&state, &config);
        assert_eq!(rows.len(), 2);

        let ria = &rows[0];
        assert!(ria.started && ria.uploads_done);
        assert_eq!((ria.videos, ria.comments_done, ria.comments, ria.disabled), (3, 2, 2, 1));

        assert_eq!(rows[1].name, "sputnik");
        assert!(!rows[1].started);
    }
}
