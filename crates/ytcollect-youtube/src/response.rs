//! YouTube Data API v3 response bodies and their conversion into records

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use ytcollect_store::{Comment, Video};

use crate::api::ChannelInfo;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_results: Option<u64>,
}

// === channels.list ===

#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<ChannelResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResource {
    pub id: String,
    pub snippet: Option<ChannelSnippet>,
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelSnippet {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

impl ChannelResource {
    pub fn into_info(self) -> ChannelInfo {
        let uploads_playlist_id = self
            .content_details
            .and_then(|d| d.related_playlists)
            .and_then(|p| p.uploads)
            .filter(|id| !id.is_empty());
        ChannelInfo {
            channel_id: self.id,
            title: self.snippet.map(|s| s.title).unwrap_or_default(),
            uploads_playlist_id,
        }
    }
}

// === playlistItems.list ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemListResponse {
    pub next_page_token: Option<String>,
    pub page_info: Option<PageInfo>,
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub snippet: PlaylistItemSnippet,
    pub content_details: Option<PlaylistItemContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    /// When the item was added to the playlist
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    pub video_published_at: Option<DateTime<Utc>>,
}

impl PlaylistItem {
    pub fn video_id(&self) -> &str {
        &self.snippet.resource_id.video_id
    }
}

// === videos.list ===

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    pub statistics: Option<VideoStatistics>,
    pub content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Counters arrive as decimal strings and are absent when hidden
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub favorite_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoContentDetails {
    pub duration: Option<String>,
    pub dimension: Option<String>,
    pub region_restriction: Option<RegionRestriction>,
}

#[derive(Debug, Deserialize)]
pub struct RegionRestriction {
    #[serde(default)]
    pub blocked: Vec<String>,
}

fn count(s: &Option<String>) -> Option<i64> {
    s.as_deref().and_then(|v| v.parse().ok())
}

/// Join a page of playlist items with their video details, in playlist order.
///
/// Items missing from `details` (private or deleted videos) keep the
/// playlist's title and description with unknown counters.
pub fn join_videos(
    channel_id: &str,
    items: Vec<PlaylistItem>,
    details: Vec<VideoResource>,
) -> Vec<Video> {
    let mut by_id: FxHashMap<String, VideoResource> =
        details.into_iter().map(|v| (v.id.clone(), v)).collect();

    items
        .into_iter()
        .map(|item| {
            let detail = by_id.remove(item.video_id());
            let PlaylistItem {
                snippet,
                content_details,
            } = item;

            let (snippet_detail, stats, content) = match detail {
                Some(d) => (d.snippet, d.statistics.unwrap_or_default(), d.content_details),
                None => (None, VideoStatistics::default(), None),
            };
            let published_at = content_details
                .and_then(|c| c.video_published_at)
                .or_else(|| snippet_detail.as_ref().and_then(|s| s.published_at))
                .unwrap_or(snippet.published_at);
            let (title, description) = match snippet_detail {
                Some(s) => (s.title, s.description),
                None => (snippet.title, snippet.description),
            };
            let (duration, dimension, region_blocked) = match content {
                Some(c) => (
                    c.duration,
                    c.dimension,
                    c.region_restriction.map(|r| r.blocked).unwrap_or_default(),
                ),
                None => (None, None, Vec::new()),
            };

            Video {
                video_id: snippet.resource_id.video_id,
                channel_id: channel_id.to_string(),
                published_at,
                title,
                description,
                duration,
                dimension,
                view_count: count(&stats.view_count),
                like_count: count(&stats.like_count),
                favorite_count: count(&stats.favorite_count),
                comment_count: count(&stats.comment_count),
                region_blocked,
            }
        })
        .collect()
}

// === commentThreads.list / comments.list ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadListResponse {
    pub next_page_token: Option<String>,
    pub page_info: Option<PageInfo>,
    #[serde(default)]
    pub items: Vec<CommentThreadResource>,
}

#[derive(Debug, Deserialize)]
pub struct CommentThreadResource {
    pub id: String,
    pub snippet: CommentThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadSnippet {
    pub video_id: Option<String>,
    pub top_level_comment: CommentResource,
    pub total_reply_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListResponse {
    pub next_page_token: Option<String>,
    pub page_info: Option<PageInfo>,
    #[serde(default)]
    pub items: Vec<CommentResource>,
}

#[derive(Debug, Deserialize)]
pub struct CommentResource {
    pub id: String,
    pub snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnippet {
    pub parent_id: Option<String>,
    #[serde(default)]
    pub author_display_name: String,
    pub author_channel_id: Option<AuthorChannelId>,
    pub author_channel_url: Option<String>,
    pub author_profile_image_url: Option<String>,
    #[serde(default)]
    pub text_display: String,
    #[serde(default)]
    pub text_original: String,
    #[serde(default)]
    pub like_count: i64,
    pub published_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorChannelId {
    pub value: String,
}

impl CommentResource {
    fn into_comment(self, video_id: &str, thread_id: &str, total_reply_count: Option<i64>) -> Comment {
        let s = self.snippet;
        Comment {
            comment_id: self.id,
            video_id: video_id.to_string(),
            thread_id: thread_id.to_string(),
            parent_id: s.parent_id,
            author: s.author_display_name,
            author_channel_id: s.author_channel_id.map(|a| a.value),
            author_channel_url: s.author_channel_url,
            author_profile_image_url: s.author_profile_image_url,
            text: s.text_display,
            text_original: s.text_original,
            like_count: s.like_count,
            published_at: s.published_at,
            updated_at: s.updated_at.unwrap_or(s.published_at),
            total_reply_count,
        }
    }
}

impl CommentThreadResource {
    /// The thread's top-level comment
    pub fn into_comment(self, video_id: &str) -> Comment {
        let video_id = self.snippet.video_id.as_deref().unwrap_or(video_id).to_string();
        self.snippet.top_level_comment.into_comment(
            &video_id,
            &self.id,
            Some(self.snippet.total_reply_count.unwrap_or(0)),
        )
    }
}

/// Replies of `thread_id`; `parentId` falls back to the thread's top-level comment
pub fn replies(items: Vec<CommentResource>, thread_id: &str, video_id: &str) -> Vec<Comment> {
    items
        .into_iter()
        .map(|r| {
            let mut c = r.into_comment(video_id, thread_id, None);
            c.parent_id.get_or_insert_with(|| thread_id.to_string());
            c
        })
        .collect()
}
