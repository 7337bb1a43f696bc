//! Request client contract: one call per API page

use ytcollect_store::{Comment, Video};

use crate::error::ApiError;

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` on the last page
    pub next_token: Option<String>,
    /// Total size of the listing as reported by the API, if known
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
            total: None,
        }
    }
}

/// Channel metadata returned by `channels.list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel_id: String,
    pub title: String,
    /// `None` when the channel has no uploads playlist
    pub uploads_playlist_id: Option<String>,
}

/// Page-level access to the YouTube Data API.
///
/// Every call is a single request (or a single request pair for uploads);
/// retrying and pagination are the caller's business.
pub trait Client {
    fn channel(&self, channel_id: &str) -> Result<ChannelInfo, ApiError>;

    /// A page of the uploads playlist, newest first, joined with video details
    fn upload_page(
        &self,
        channel_id: &str,
        playlist_id: &str,
        token: Option<&str>,
    ) -> Result<Page<Video>, ApiError>;

    /// A page of top-level comments of a video
    fn comment_thread_page(
        &self,
        video_id: &str,
        token: Option<&str>,
    ) -> Result<Page<Comment>, ApiError>;

    /// A page of replies within a comment thread
    fn reply_page(
        &self,
        thread_id: &str,
        video_id: &str,
        token: Option<&str>,
    ) -> Result<Page<Comment>, ApiError>;
}

impl<C: Client + ?Sized> Client for &C {
    fn channel(&self, channel_id: &str) -> Result<ChannelInfo, ApiError> {
        (**self).channel(channel_id)
    }

    fn upload_page(
        &self,
        channel_id: &str,
        playlist_id: &str,
        token: Option<&str>,
    ) -> Result<Page<Video>, ApiError> {
        (**self).upload_page(channel_id, playlist_id, token)
    }

    fn comment_thread_page(
        &self,
        video_id: &str,
        token: Option<&str>,
    ) -> Result<Page<Comment>, ApiError> {
        (**self).comment_thread_page(video_id, token)
    }

    fn reply_page(
        &self,
        thread_id: &str,
        video_id: &str,
        token: Option<&str>,
    ) -> Result<Page<Comment>, ApiError> {
        (**self).reply_page(thread_id, video_id, token)
    }
}
