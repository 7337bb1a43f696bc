//! ytcollect-youtube: YouTube Data API client and the resumable collector
//!
//! The [`Collector`] walks each requested channel's uploads and the comment
//! threads of every video, merging pages into the store's accumulator and
//! committing a checkpoint after each one. A quota halt leaves the cursors
//! where the next invocation picks up.

pub mod api;
pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod report;
pub mod response;

pub use api::{ChannelInfo, Client, Page};
pub use collector::{Collector, Phase, collect_data_channels};
pub use config::{ChannelSpec, CollectConfig, normalize_channel_name};
pub use error::ApiError;
pub use http::{DEFAULT_BASE_URL, HttpClient};
pub use report::{ChannelSummary, CollectReport};
