//! `Client` over HTTPS: reqwest async requests driven by a shared runtime

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use ytcollect_store::{Comment, Video};

use crate::api::{ChannelInfo, Client, Page};
use crate::error::ApiError;
use crate::response::{
    ChannelListResponse, CommentListResponse, CommentThreadListResponse,
    PlaylistItemListResponse, VideoListResponse, join_videos, replies,
};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const PLAYLIST_PAGE_SIZE: &str = "50";
const COMMENT_PAGE_SIZE: &str = "100";

/// Runtime the blocking `Client` calls are executed on.
static RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// YouTube Data API v3 client authenticated with an API key.
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!api_key.is_empty(), "YouTube API key is empty");
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// GET `{base}/{endpoint}` and decode the JSON body.
    fn get<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T, ApiError> {
        log::debug!("GET {endpoint} {params:?}");
        let url = format!("{}/{endpoint}", self.base_url);
        RUNTIME.handle().block_on(async {
            let response = self
                .client
                .get(&url)
                .query(params)
                .query(&[("key", self.api_key.as_str())])
                .send()
                .await
                .map_err(ApiError::from_reqwest)?;
            let status = response.status();
            let body = response.text().await.map_err(ApiError::from_reqwest)?;
            if !status.is_success() {
                return Err(ApiError::from_response(status.as_u16(), &body));
            }
            serde_json::from_str(&body).map_err(|e| ApiError::Malformed(format!("{endpoint}: {e}")))
        })
    }
}

fn with_token<'a>(mut params: Vec<(&'a str, &'a str)>, token: Option<&'a str>) -> Vec<(&'a str, &'a str)> {
    if let Some(token) = token {
        params.push(("pageToken", token));
    }
    params
}

impl Client for HttpClient {
    fn channel(&self, channel_id: &str) -> Result<ChannelInfo, ApiError> {
        let resp: ChannelListResponse = self.get(
            "channels",
            &[("part", "snippet,contentDetails"), ("id", channel_id)],
        )?;
        resp.items
            .into_iter()
            .next()
            .map(|c| c.into_info())
            .ok_or_else(|| ApiError::NotFound {
                reason: "channelNotFound".to_string(),
            })
    }

    fn upload_page(
        &self,
        channel_id: &str,
        playlist_id: &str,
        token: Option<&str>,
    ) -> Result<Page<Video>, ApiError> {
        let params = with_token(
            vec![
                ("part", "snippet,contentDetails"),
                ("playlistId", playlist_id),
                ("maxResults", PLAYLIST_PAGE_SIZE),
            ],
            token,
        );
        let page: PlaylistItemListResponse = self.get("playlistItems", &params)?;

        let details = if page.items.is_empty() {
            Vec::new()
        } else {
            let ids = page
                .items
                .iter()
                .map(|i| i.video_id())
                .collect::<Vec<_>>()
                .join(",");
            let resp: VideoListResponse = self.get(
                "videos",
                &[("part", "snippet,statistics,contentDetails"), ("id", ids.as_str())],
            )?;
            resp.items
        };

        Ok(Page {
            items: join_videos(channel_id, page.items, details),
            next_token: page.next_page_token,
            total: page.page_info.and_then(|p| p.total_results),
        })
    }

    fn comment_thread_page(
        &self,
        video_id: &str,
        token: Option<&str>,
    ) -> Result<Page<Comment>, ApiError> {
        let params = with_token(
            vec![
                ("part", "snippet"),
                ("videoId", video_id),
                ("maxResults", COMMENT_PAGE_SIZE),
                ("textFormat", "html"),
            ],
            token,
        );
        let page: CommentThreadListResponse = self.get("commentThreads", &params)?;
        Ok(Page {
            items: page
                .items
                .into_iter()
                .map(|t| t.into_comment(video_id))
                .collect(),
            next_token: page.next_page_token,
            total: page.page_info.and_then(|p| p.total_results),
        })
    }

    fn reply_page(
        &self,
        thread_id: &str,
        video_id: &str,
        token: Option<&str>,
    ) -> Result<Page<Comment>, ApiError> {
        let params = with_token(
            vec![
                ("part", "snippet"),
                ("parentId", thread_id),
                ("maxResults", COMMENT_PAGE_SIZE),
                ("textFormat", "html"),
            ],
            token,
        );
        let page: CommentListResponse = self.get("comments", &params)?;
        Ok(Page {
            items: replies(page.items, thread_id, video_id),
            next_token: page.next_page_token,
            total: page.page_info.and_then(|p| p.total_results),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_rejected() {
        assert!(HttpClient::new("", DEFAULT_BASE_URL, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn debug_hides_key() {
        let c = HttpClient::new("secret-key", DEFAULT_BASE_URL, Duration::from_secs(5)).unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("googleapis"));
    }

    #[test]
    fn page_token_appended_only_when_present() {
        assert_eq!(with_token(vec![("part", "snippet")], None).len(), 1);
        let p = with_token(vec![("part", "snippet")], Some("EAAa"));
        assert_eq!(p[1], ("pageToken", "EAAa"));
    }
}
