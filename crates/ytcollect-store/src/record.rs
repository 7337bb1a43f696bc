//! Entity records: one row type per collected table

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::accumulator::{Accumulator, Table};
use crate::batch::Columnar;

/// Kinds of collected entities, one table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Channels,
    Videos,
    Comments,
}

impl EntityKind {
    /// Table name, also used as the segment file prefix
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::Videos => "videos",
            Self::Comments => "comments",
        }
    }

    /// Parse table name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "channels" => Some(Self::Channels),
            "videos" => Some(Self::Videos),
            "comments" => Some(Self::Comments),
            _ => None,
        }
    }

    pub fn all() -> &'static [EntityKind] {
        &[Self::Channels, Self::Videos, Self::Comments]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A row of one of the accumulated tables.
///
/// Rows are keyed by a stable identifier and grouped under an optional
/// parent key (a video's channel, a comment's video).
pub trait Record: Clone + Columnar {
    const KIND: EntityKind;

    /// Unique identifier of the row
    fn key(&self) -> &str;

    /// Identifier of the owning entity, if any
    fn parent_key(&self) -> Option<&str>;

    fn table(acc: &Accumulator) -> &Table<Self>;

    fn table_mut(acc: &mut Accumulator) -> &mut Table<Self>;

    /// Bring the row to what a checkpoint stores, so a reload compares equal
    fn normalize(&mut self) {}
}

/// Timestamps are stored with microsecond precision
pub fn stored_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// A YouTube channel named by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub channel_id: String,
    /// Caller-supplied short name (normalized, e.g. `ria-news`)
    pub name: String,
    /// Channel title as reported by the API
    pub title: Option<String>,
    /// Playlist holding every upload; `None` if the channel has none
    pub uploads_playlist_id: Option<String>,
}

/// A video from a channel's uploads playlist, joined with its details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub video_id: String,
    pub channel_id: String,
    pub published_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    /// ISO-8601 duration as returned by the API (e.g. `PT4M13S`)
    pub duration: Option<String>,
    pub dimension: Option<String>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub favorite_count: Option<i64>,
    pub comment_count: Option<i64>,
    /// Region codes where the video is blocked; empty when unrestricted
    pub region_blocked: Vec<String>,
}

/// A top-level comment or a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub comment_id: String,
    pub video_id: String,
    pub thread_id: String,
    /// Top-level comment this replies to; `None` for top-level comments
    pub parent_id: Option<String>,
    pub author: String,
    pub author_channel_id: Option<String>,
    pub author_channel_url: Option<String>,
    pub author_profile_image_url: Option<String>,
    pub text: String,
    pub text_original: String,
    pub like_count: i64,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Reply count of the thread, only known for top-level comments
    pub total_reply_count: Option<i64>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Whether the thread started by this comment has replies to page through
    pub fn has_replies(&self) -> bool {
        !self.is_reply() && self.total_reply_count.is_some_and(|n| n > 0)
    }
}

impl Record for Channel {
    const KIND: EntityKind = EntityKind::Channels;

    fn key(&self) -> &str {
        &self.channel_id
    }

    fn parent_key(&self) -> Option<&str> {
        None
    }

    fn table(acc: &Accumulator) -> &Table<Self> {
        &acc.channels
    }

    fn table_mut(acc: &mut Accumulator) -> &mut Table<Self> {
        &mut acc.channels
    }
}

impl Record for Video {
    const KIND: EntityKind = EntityKind::Videos;

    fn key(&self) -> &str {
        &self.video_id
    }

    fn parent_key(&self) -> Option<&str> {
        Some(&self.channel_id)
    }

    fn normalize(&mut self) {
        self.published_at = stored_precision(self.published_at);
    }

    fn table(acc: &Accumulator) -> &Table<Self> {
        &acc.videos
    }

    fn table_mut(acc: &mut Accumulator) -> &mut Table<Self> {
        &mut acc.videos
    }
}

impl Record for Comment {
    const KIND: EntityKind = EntityKind::Comments;

    fn key(&self) -> &str {
        &self.comment_id
    }

    fn parent_key(&self) -> Option<&str> {
        Some(&self.video_id)
    }

    fn normalize(&mut self) {
        self.published_at = stored_precision(self.published_at);
        self.updated_at = stored_precision(self.updated_at);
    }

    fn table(acc: &Accumulator) -> &Table<Self> {
        &acc.comments
    }

    fn table_mut(acc: &mut Accumulator) -> &mut Table<Self> {
        &mut acc.comments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_names() {
        for &kind in EntityKind::all() {
            assert_eq!(EntityKind::from_name(kind.table_name()), Some(kind));
        }
        assert_eq!(EntityKind::from_name("playlists"), None);
        assert_eq!(EntityKind::Videos.to_string(), "videos");
    }

    #[test]
    fn entity_kind_serde_lowercase() {
        let json = serde_json::to_string(&EntityKind::Comments).unwrap();
        assert_eq!(json, "\"comments\"");
    }

    #[test]
    fn reply_detection() {
        let ts = DateTime::from_timestamp(1_650_000_000, 0).unwrap();
        let top = Comment {
            comment_id: "c1".into(),
            video_id: "v1".into(),
            thread_id: "c1".into(),
            parent_id: None,
            author: "a".into(),
            author_channel_id: None,
            author_channel_url: None,
            author_profile_image_url: None,
            text: "hi".into(),
            text_original: "hi".into(),
            like_count: 0,
            published_at: ts,
            updated_at: ts,
            total_reply_count: Some(2),
        };
        assert!(top.has_replies());

        let reply = Comment {
            comment_id: "c1.r1".into(),
            parent_id: Some("c1".into()),
            total_reply_count: None,
            ..top.clone()
        };
        assert!(reply.is_reply());
        assert!(!reply.has_replies());

        let quiet = Comment {
            total_reply_count: Some(0),
            ..top
        };
        assert!(!quiet.has_replies());
    }
}
