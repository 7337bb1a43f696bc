//! Resumable collection of channels, videos and comments
//!
//! Every page goes through the same steps: request (with retry), merge into
//! the accumulator, advance the listing's cursor, commit a checkpoint. A halt
//! therefore always leaves the cursors pointing at the first page whose
//! records are not yet durable.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use chrono::Utc;
use ytcollect_core::{ProgressContext, SharedProgress, retry_with_backoff, shutdown_flag};
use ytcollect_store::{
    Channel, ChannelCounts, CheckpointStore, CollectionState, Comment, CursorKind, HaltPoint,
    RecordScope, RunLog, RunRecord, RunStatus, Video,
};

use crate::api::{Client, Page};
use crate::config::{ChannelSpec, CollectConfig};
use crate::error::ApiError;
use crate::report::{ChannelSummary, CollectReport, comments_progress_line, videos_progress_line};

/// Where the collector currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CollectingVideos { channel: String },
    CollectingComments { channel: String },
    Completed,
    Halted(RunStatus),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::CollectingVideos { channel } => write!(f, "collecting videos of {channel}"),
            Self::CollectingComments { channel } => write!(f, "collecting comments of {channel}"),
            Self::Completed => f.write_str("completed"),
            Self::Halted(status) => write!(f, "halted ({status})"),
        }
    }
}

/// Why a channel stopped before finishing
enum Stop {
    /// Quota, API error or interruption; the checkpoint is intact
    Halt {
        status: RunStatus,
        at: HaltPoint,
        error: Option<String>,
    },
    /// A checkpoint could not be written
    Persist(anyhow::Error),
}

impl Stop {
    fn from_api(err: ApiError, at: HaltPoint) -> Self {
        let status = if err.is_quota() {
            RunStatus::QuotaExceeded
        } else {
            RunStatus::Error
        };
        Self::Halt {
            status,
            at,
            error: Some(err.to_string()),
        }
    }
}

/// Drives a collection over a [`Client`] and a [`CheckpointStore`].
pub struct Collector<C: Client> {
    client: C,
    config: CollectConfig,
    store: CheckpointStore,
    state: CollectionState,
    run_log: RunLog,
    progress: SharedProgress,
    shutdown: Arc<AtomicBool>,
    phase: Phase,
}

impl<C: Client> Collector<C> {
    /// `store` and `state` are the pair returned by [`CheckpointStore::open`].
    pub fn new(
        client: C,
        config: CollectConfig,
        store: CheckpointStore,
        state: CollectionState,
    ) -> Self {
        let run_log = RunLog::in_dir(store.dir());
        Self {
            client,
            config,
            store,
            state,
            run_log,
            progress: Arc::new(ProgressContext::hidden()),
            shutdown: Arc::clone(shutdown_flag()),
            phase: Phase::Idle,
        }
    }

    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Flag checked before every request; set it to stop at the next page boundary
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn with_run_log(mut self, run_log: RunLog) -> Self {
        self.run_log = run_log;
        self
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn into_parts(self) -> (CheckpointStore, CollectionState) {
        (self.store, self.state)
    }

    /// Collect every configured channel, resuming from the last checkpoint.
    ///
    /// Quota exhaustion, API errors and interruption end the run with the
    /// matching status in the report; only a failed checkpoint is an `Err`.
    pub fn collect(&mut self) -> anyhow::Result<CollectReport> {
        self.config.validate()?;

        let started_at = Utc::now();
        let run_id = RunRecord::new_run_id(started_at);
        log::info!(
            "Run {run_id}: {} channels, cutoff {}{}",
            self.config.channels.len(),
            self.config.cutoff,
            self.config
                .since
                .map(|s| format!(", since {s}"))
                .unwrap_or_default()
        );

        let mut summaries: Vec<ChannelSummary> = Vec::new();
        let mut halt: Option<(RunStatus, Option<HaltPoint>, Option<String>)> = None;
        let mut failure: Option<anyhow::Error> = None;

        for spec in self.config.channels.clone() {
            let channel_started = Utc::now();
            let mut counts = ChannelCounts::default();
            let result = self.collect_channel(&spec, &mut counts);
            self.fill_totals(&spec, &mut counts);

            let (status, halted_at, error) = match result {
                Ok(()) => (RunStatus::Completed, None, None),
                Err(Stop::Halt { status, at, error }) => (status, Some(at), error),
                // A persistence failure has no resumable halt point
                Err(Stop::Persist(e)) => {
                    let msg = format!("{e:#}");
                    failure = Some(e);
                    (RunStatus::Error, None, Some(msg))
                }
            };

            self.run_log.record(&RunRecord {
                scope: RecordScope::Channel,
                run_id: run_id.clone(),
                started_at: channel_started,
                finished_at: Utc::now(),
                status,
                channels: BTreeMap::from([(spec.name.clone(), counts)]),
                halted_at: halted_at.clone(),
                error: error.clone(),
            });
            summaries.push(ChannelSummary {
                name: spec.name.clone(),
                channel_id: spec.id.clone(),
                status,
                counts,
            });

            if status.is_halt() {
                halt = Some((status, halted_at, error));
                break;
            }
        }

        if halt.is_none() {
            if let Err(e) = self.store.compact(&mut self.state) {
                halt = Some((RunStatus::Error, None, Some(format!("{e:#}"))));
                failure = Some(e);
            }
        }

        let (status, halted_at, error) = halt.unwrap_or((RunStatus::Completed, None, None));
        self.phase = match status {
            RunStatus::Completed => Phase::Completed,
            s => Phase::Halted(s),
        };

        let finished_at = Utc::now();
        self.run_log.record(&RunRecord {
            scope: RecordScope::Run,
            run_id: run_id.clone(),
            started_at,
            finished_at,
            status,
            channels: summaries
                .iter()
                .map(|s| (s.name.clone(), s.counts))
                .collect(),
            halted_at: halted_at.clone(),
            error: error.clone(),
        });

        if let Some(e) = failure {
            return Err(e.context(format!("run {run_id} stopped: checkpoint failed")));
        }

        match (&status, &halted_at) {
            (RunStatus::Completed, _) => log::info!("Run {run_id} completed"),
            (status, Some(at)) => log::warn!("Run {run_id} halted ({status}) at {at}"),
            (status, None) => log::warn!("Run {run_id} halted ({status})"),
        }

        Ok(CollectReport {
            run_id,
            status,
            started_at,
            finished_at,
            channels: summaries,
            halted_at,
            error,
            totals: self.state.accumulator.counts(),
        })
    }

    // === Per channel ===

    fn collect_channel(&mut self, spec: &ChannelSpec, counts: &mut ChannelCounts) -> Result<(), Stop> {
        self.phase = Phase::CollectingVideos {
            channel: spec.name.clone(),
        };
        let Some(playlist_id) = self.resolve_channel(spec)? else {
            return Ok(());
        };
        self.collect_uploads(spec, &playlist_id, counts)?;

        self.phase = Phase::CollectingComments {
            channel: spec.name.clone(),
        };
        self.collect_comments(spec, counts)?;
        log::info!(
            "Channel {} done: +{} videos, +{} comments",
            spec.name,
            counts.videos_added,
            counts.comments_added
        );
        Ok(())
    }

    /// Look up (or reuse) the channel row; returns its uploads playlist.
    fn resolve_channel(&mut self, spec: &ChannelSpec) -> Result<Option<String>, Stop> {
        if let Some(existing) = self.state.accumulator.get::<Channel>(&spec.id) {
            return Ok(existing.uploads_playlist_id.clone());
        }

        let at = halt_point(spec, CursorKind::Uploads, &spec.id);
        self.check_shutdown(&at)?;
        let channel = match self.request(&format!("channel {}", spec.name), || {
            self.client.channel(&spec.id)
        }) {
            Ok(info) => Channel {
                channel_id: spec.id.clone(),
                name: spec.name.clone(),
                title: Some(info.title),
                uploads_playlist_id: info.uploads_playlist_id,
            },
            Err(ApiError::NotFound { reason }) => {
                log::warn!("Channel {} ({}) not found: {reason}", spec.name, spec.id);
                Channel {
                    channel_id: spec.id.clone(),
                    name: spec.name.clone(),
                    title: None,
                    uploads_playlist_id: None,
                }
            }
            Err(e) => return Err(Stop::from_api(e, at)),
        };

        let playlist_id = channel.uploads_playlist_id.clone();
        if playlist_id.is_none() {
            log::info!("Channel {} has no uploads", spec.name);
            self.state.cursors.mark_exhausted(CursorKind::Uploads, &spec.id);
        }
        self.state.accumulator.merge(vec![channel]);
        self.checkpoint()?;
        Ok(playlist_id)
    }

    fn collect_uploads(
        &mut self,
        spec: &ChannelSpec,
        playlist_id: &str,
        counts: &mut ChannelCounts,
    ) -> Result<(), Stop> {
        let line = self.progress.stage_line(&spec.name);
        while !self.state.cursors.is_exhausted(CursorKind::Uploads, &spec.id) {
            let at = halt_point(spec, CursorKind::Uploads, &spec.id);
            self.check_shutdown(&at)?;

            let token = self
                .state
                .cursors
                .page_token(CursorKind::Uploads, &spec.id)
                .map(str::to_string);
            let page = match self.request(&format!("uploads of {}", spec.name), || {
                self.client
                    .upload_page(&spec.id, playlist_id, token.as_deref())
            }) {
                Ok(page) => page,
                Err(ApiError::NotFound { reason }) => {
                    log::warn!("Uploads playlist of {} not found: {reason}", spec.name);
                    Page::last(Vec::new())
                }
                Err(e) => {
                    line.finish_and_clear();
                    return Err(Stop::from_api(e, at));
                }
            };

            let total = page.total;
            let next = if page.items.iter().any(|v| self.config.predates_window(v.published_at)) {
                None
            } else {
                page.next_token
            };
            let videos: Vec<Video> = page
                .items
                .into_iter()
                .filter(|v| self.config.in_window(v.published_at))
                .collect();

            counts.videos_added += self.state.accumulator.merge(videos);
            self.state
                .cursors
                .advance(CursorKind::Uploads, &spec.id, next);
            self.checkpoint()?;

            let collected = self
                .state
                .accumulator
                .table::<Video>()
                .count_children(&spec.id);
            let msg = videos_progress_line(collected, total, &spec.name);
            line.set_message(msg.clone());
            self.progress.println(msg);
        }
        line.finish_and_clear();
        Ok(())
    }

    fn collect_comments(&mut self, spec: &ChannelSpec, counts: &mut ChannelCounts) -> Result<(), Stop> {
        let video_ids: Vec<String> = self
            .state
            .accumulator
            .videos_of(&spec.id)
            .map(|v| v.video_id.clone())
            .collect();
        let total = video_ids.len();
        let done = |state: &CollectionState| {
            video_ids
                .iter()
                .filter(|id| state.cursors.is_exhausted(CursorKind::CommentThreads, id))
                .count()
        };

        self.progress
            .println(comments_progress_line(done(&self.state), total, &spec.name));
        for (i, video_id) in video_ids.iter().enumerate() {
            self.collect_threads(spec, video_id, counts)?;
            if self.config.replies {
                self.collect_replies(spec, video_id, counts)?;
            }
            if (i + 1) % self.config.comment_log_every == 0 && i + 1 < total {
                self.progress
                    .println(comments_progress_line(done(&self.state), total, &spec.name));
            }
        }
        self.progress
            .println(comments_progress_line(done(&self.state), total, &spec.name));
        Ok(())
    }

    fn collect_threads(
        &mut self,
        spec: &ChannelSpec,
        video_id: &str,
        counts: &mut ChannelCounts,
    ) -> Result<(), Stop> {
        let kind = CursorKind::CommentThreads;
        while !self.state.cursors.is_exhausted(kind, video_id) {
            let at = halt_point(spec, kind, video_id);
            self.check_shutdown(&at)?;

            let token = self.state.cursors.page_token(kind, video_id).map(str::to_string);
            match self.request(&format!("comments of {video_id}"), || {
                self.client.comment_thread_page(video_id, token.as_deref())
            }) {
                Ok(page) => {
                    counts.comments_added += self.merge_comments(page.items);
                    self.state.cursors.advance(kind, video_id, page.next_token);
                }
                Err(ApiError::CommentsDisabled) => {
                    log::debug!("Comments disabled for video {video_id}");
                    self.state.comments_disabled.insert(video_id.to_string());
                    self.state.cursors.mark_exhausted(kind, video_id);
                }
                Err(ApiError::NotFound { reason }) => {
                    log::warn!("Video {video_id} not found ({reason}), skipping its comments");
                    self.state.cursors.mark_exhausted(kind, video_id);
                }
                Err(e) => return Err(Stop::from_api(e, at)),
            }
            self.checkpoint()?;
        }
        Ok(())
    }

    fn collect_replies(
        &mut self,
        spec: &ChannelSpec,
        video_id: &str,
        counts: &mut ChannelCounts,
    ) -> Result<(), Stop> {
        let kind = CursorKind::Replies;
        let threads: Vec<String> = self
            .state
            .accumulator
            .comments_of(video_id)
            .filter(|c| c.has_replies())
            .map(|c| c.thread_id.clone())
            .collect();

        for thread_id in &threads {
            while !self.state.cursors.is_exhausted(kind, thread_id) {
                let at = halt_point(spec, kind, thread_id);
                self.check_shutdown(&at)?;

                let token = self.state.cursors.page_token(kind, thread_id).map(str::to_string);
                match self.request(&format!("replies to {thread_id}"), || {
                    self.client.reply_page(thread_id, video_id, token.as_deref())
                }) {
                    Ok(page) => {
                        counts.comments_added += self.merge_comments(page.items);
                        self.state.cursors.advance(kind, thread_id, page.next_token);
                    }
                    Err(ApiError::NotFound { .. } | ApiError::CommentsDisabled) => {
                        log::debug!("Replies of thread {thread_id} unavailable");
                        self.state.cursors.mark_exhausted(kind, thread_id);
                    }
                    Err(e) => return Err(Stop::from_api(e, at)),
                }
                self.checkpoint()?;
            }
        }
        Ok(())
    }

    // === Helpers ===

    fn merge_comments(&mut self, comments: Vec<Comment>) -> usize {
        self.state.accumulator.merge(comments)
    }

    fn request<T>(
        &self,
        label: &str,
        call: impl FnMut() -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        retry_with_backoff(label, &self.config.retry, call)
    }

    fn check_shutdown(&self, at: &HaltPoint) -> Result<(), Stop> {
        if self.shutdown.load(Ordering::Relaxed) {
            log::warn!("Shutdown requested, stopping before {at}");
            return Err(Stop::Halt {
                status: RunStatus::Interrupted,
                at: at.clone(),
                error: None,
            });
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<(), Stop> {
        self.store
            .commit(&mut self.state)
            .context("checkpoint failed")
            .map_err(Stop::Persist)
    }

    fn fill_totals(&self, spec: &ChannelSpec, counts: &mut ChannelCounts) {
        let acc = &self.state.accumulator;
        counts.videos_total = acc.table::<Video>().count_children(&spec.id);
        counts.comments_disabled = acc
            .videos_of(&spec.id)
            .filter(|v| self.state.comments_disabled.contains(&v.video_id))
            .count();
    }
}

fn halt_point(spec: &ChannelSpec, kind: CursorKind, parent_id: &str) -> HaltPoint {
    HaltPoint {
        channel: spec.name.clone(),
        kind,
        parent_id: parent_id.to_string(),
    }
}

/// Open the store under `data_dir`, collect, and return the report.
pub fn collect_data_channels<C: Client>(
    client: C,
    config: CollectConfig,
    data_dir: &std::path::Path,
    zstd_level: i32,
) -> anyhow::Result<CollectReport> {
    let (store, state) = CheckpointStore::open(data_dir, zstd_level)
        .with_context(|| format!("failed to open checkpoint in {}", data_dir.display()))?;
    Collector::new(client, config, store, state).collect()
}
