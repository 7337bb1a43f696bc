//! Durable checkpoints of the accumulated tables and their cursors
//!
//! Directory layout:
//! ```text
//! {data_dir}/
//! ├── state.json            # manifest (commit point)
//! ├── segments/
//! │   ├── channels-000001.parquet
//! │   ├── videos-000002.parquet
//! │   └── ...
//! └── runs.jsonl            # run log
//! ```
//!
//! Each checkpoint writes one segment per table holding only the rows added
//! since the previous checkpoint, then replaces `state.json`. Segments not
//! listed by `state.json` are leftovers of an interrupted checkpoint and are
//! removed on open.

use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use ytcollect_core::{ParquetSink, cleanup_tmp_files, write_file_atomic};

use crate::accumulator::Accumulator;
use crate::batch::RECORD_BATCH_SIZE;
use crate::cursor::CursorTracker;
use crate::hash;
use crate::record::{Channel, Comment, EntityKind, Record, Video};

pub const FORMAT_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "state.json";
pub const SEGMENT_DIR: &str = "segments";

/// Segments allowed before a commit triggers compaction
pub const DEFAULT_COMPACT_THRESHOLD: usize = 256;

/// One parquet file holding a contiguous run of a table's rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: EntityKind,
    /// File name under `segments/`
    pub file: String,
    pub rows: usize,
    /// Full blake3 hex digest of the file
    pub blake3: String,
}

/// Contents of `state.json`: everything needed to rebuild a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    /// Incremented by every commit; 0 means nothing was ever committed
    pub generation: u64,
    pub updated_at: DateTime<Utc>,
    /// Segments in load order
    pub segments: Vec<Segment>,
    pub cursors: CursorTracker,
    /// Videos whose comment listing is disabled
    #[serde(default)]
    pub comments_disabled: BTreeSet<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            generation: 0,
            updated_at: Utc::now(),
            segments: Vec::new(),
            cursors: CursorTracker::new(),
            comments_disabled: BTreeSet::new(),
        }
    }
}

impl Manifest {
    /// Read `{dir}/state.json`, `None` if no checkpoint exists yet
    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let manifest: Self = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        ensure!(
            manifest.format_version == FORMAT_VERSION,
            "{} has format version {}, expected {}",
            path.display(),
            manifest.format_version,
            FORMAT_VERSION
        );
        Ok(Some(manifest))
    }

    fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(self).context("failed to serialize manifest")?;
        write_file_atomic(&path, &json)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Rows recorded per table
    pub fn rows(&self, kind: EntityKind) -> usize {
        self.segments
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.rows)
            .sum()
    }
}

/// Everything a collection carries between checkpoints.
#[derive(Debug, Clone, Default)]
pub struct CollectionState {
    pub accumulator: Accumulator,
    pub cursors: CursorTracker,
    pub comments_disabled: BTreeSet<String>,
}

/// Writes and restores checkpoints under one data directory.
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    zstd_level: i32,
    compact_threshold: usize,
    manifest: Manifest,
}

impl CheckpointStore {
    /// Open (or create) the store at `dir` and load the last committed state.
    ///
    /// Stale tmp files and unreferenced segments are removed first; every
    /// referenced segment must match its recorded hash and row count.
    pub fn open(dir: &Path, zstd_level: i32) -> Result<(Self, CollectionState)> {
        let segment_dir = dir.join(SEGMENT_DIR);
        fs::create_dir_all(&segment_dir)
            .with_context(|| format!("failed to create {}", segment_dir.display()))?;

        cleanup_tmp_files(dir).with_context(|| format!("failed to clean {}", dir.display()))?;
        cleanup_tmp_files(&segment_dir)
            .with_context(|| format!("failed to clean {}", segment_dir.display()))?;

        let manifest = Manifest::read(dir)?.unwrap_or_default();
        let store = Self {
            dir: dir.to_path_buf(),
            zstd_level,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            manifest,
        };
        store.remove_orphans()?;

        let state = store.load_state()?;
        let counts = state.accumulator.counts();
        log::info!(
            "Opened checkpoint generation {} in {}: {} channels, {} videos, {} comments",
            store.manifest.generation,
            dir.display(),
            counts.channels,
            counts.videos,
            counts.comments
        );
        Ok((store, state))
    }

    /// Load the committed state without touching the directory.
    ///
    /// Leftovers of an interrupted commit are ignored rather than removed,
    /// so this is safe while another process is collecting.
    pub fn read_state(dir: &Path) -> Result<CollectionState> {
        let store = Self {
            dir: dir.to_path_buf(),
            zstd_level: 0,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            manifest: Manifest::read(dir)?.unwrap_or_default(),
        };
        store.load_state()
    }

    pub fn with_compact_threshold(mut self, threshold: usize) -> Self {
        self.compact_threshold = threshold.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn generation(&self) -> u64 {
        self.manifest.generation
    }

    pub fn segment_count(&self) -> usize {
        self.manifest.segments.len()
    }

    /// Persist rows added since the last commit together with the current
    /// cursors and disabled set.
    ///
    /// On error the previous checkpoint stays in effect and the rows remain
    /// unpersisted, so a later commit retries them.
    pub fn commit(&mut self, state: &mut CollectionState) -> Result<()> {
        if !self.is_dirty(state) {
            return Ok(());
        }

        let generation = self.manifest.generation + 1;
        let acc = &state.accumulator;
        let mut segments = self.manifest.segments.clone();
        for segment in [
            self.write_segment(acc.table::<Channel>().unpersisted(), generation)?,
            self.write_segment(acc.table::<Video>().unpersisted(), generation)?,
            self.write_segment(acc.table::<Comment>().unpersisted(), generation)?,
        ]
        .into_iter()
        .flatten()
        {
            segments.push(segment);
        }

        self.publish(generation, segments, state)?;
        log::debug!(
            "Committed checkpoint generation {generation} ({} segments)",
            self.segment_count()
        );

        if self.segment_count() > self.compact_threshold {
            self.compact(state)?;
        }
        Ok(())
    }

    /// Rewrite every table into a single segment and drop the old files.
    pub fn compact(&mut self, state: &mut CollectionState) -> Result<()> {
        let one_per_kind = EntityKind::all().iter().all(|&kind| {
            self.manifest.segments.iter().filter(|s| s.kind == kind).count() <= 1
        });
        if one_per_kind && !self.is_dirty(state) {
            return Ok(());
        }

        let generation = self.manifest.generation + 1;
        let acc = &state.accumulator;
        let segments: Vec<Segment> = [
            self.write_segment(acc.channels(), generation)?,
            self.write_segment(acc.videos(), generation)?,
            self.write_segment(acc.comments(), generation)?,
        ]
        .into_iter()
        .flatten()
        .collect();

        let before = self.segment_count();
        let superseded: Vec<String> = self
            .manifest
            .segments
            .iter()
            .map(|s| s.file.clone())
            .filter(|file| !segments.iter().any(|s| &s.file == file))
            .collect();

        self.publish(generation, segments, state)?;

        for file in superseded {
            let path = self.segment_dir().join(&file);
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Failed to remove compacted segment {}: {e}", path.display());
            }
        }
        log::info!(
            "Compacted checkpoint: {before} segments -> {}",
            self.segment_count()
        );
        Ok(())
    }

    fn segment_dir(&self) -> PathBuf {
        self.dir.join(SEGMENT_DIR)
    }

    fn is_dirty(&self, state: &CollectionState) -> bool {
        state.accumulator.has_unpersisted()
            || state.cursors != self.manifest.cursors
            || state.comments_disabled != self.manifest.comments_disabled
    }

    /// Write the manifest for `generation`; the rename inside is the commit point.
    fn publish(
        &mut self,
        generation: u64,
        segments: Vec<Segment>,
        state: &mut CollectionState,
    ) -> Result<()> {
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            generation,
            updated_at: Utc::now(),
            segments,
            cursors: state.cursors.clone(),
            comments_disabled: state.comments_disabled.clone(),
        };
        manifest.write(&self.dir)?;
        self.manifest = manifest;
        state.accumulator.mark_persisted();
        Ok(())
    }

    fn write_segment<R: Record>(&self, rows: &[R], generation: u64) -> Result<Option<Segment>> {
        if rows.is_empty() {
            return Ok(None);
        }
        let file = format!("{}-{generation:06}.parquet", R::KIND);
        let path = self.segment_dir().join(&file);

        let mut sink = ParquetSink::new(&path, R::schema(), self.zstd_level)
            .with_context(|| format!("failed to create {}", path.display()))?;
        for chunk in rows.chunks(RECORD_BATCH_SIZE) {
            let batch = R::to_batch(chunk)
                .with_context(|| format!("failed to build {} batch", R::KIND))?;
            sink.write_batch(&batch)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        let written = sink
            .finalize()
            .with_context(|| format!("failed to finalize {}", path.display()))?;
        let blake3 = hash::file_digest(&path)
            .with_context(|| format!("failed to hash {}", path.display()))?;

        Ok(Some(Segment {
            kind: R::KIND,
            file,
            rows: written,
            blake3,
        }))
    }

    fn read_segment<R: Record>(&self, segment: &Segment) -> Result<Vec<R>> {
        let path = self.segment_dir().join(&segment.file);
        let actual = hash::file_digest(&path)
            .with_context(|| format!("failed to hash {}", path.display()))?;
        if actual != segment.blake3 {
            bail!(
                "segment {} is corrupt: blake3 {} != recorded {}",
                path.display(),
                hash::short_digest(&actual),
                hash::short_digest(&segment.blake3)
            );
        }

        let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("failed to read {}", path.display()))?
            .with_batch_size(RECORD_BATCH_SIZE)
            .build()
            .with_context(|| format!("failed to read {}", path.display()))?;

        let mut rows = Vec::with_capacity(segment.rows);
        for batch in reader {
            let batch = batch.with_context(|| format!("failed to decode {}", path.display()))?;
            rows.extend(R::from_batch(&batch).with_context(|| format!("in {}", path.display()))?);
        }
        ensure!(
            rows.len() == segment.rows,
            "segment {} holds {} rows, manifest records {}",
            path.display(),
            rows.len(),
            segment.rows
        );
        Ok(rows)
    }

    fn load_state(&self) -> Result<CollectionState> {
        let mut state = CollectionState {
            accumulator: Accumulator::new(),
            cursors: self.manifest.cursors.clone(),
            comments_disabled: self.manifest.comments_disabled.clone(),
        };
        for segment in &self.manifest.segments {
            match segment.kind {
                EntityKind::Channels => self.load_segment::<Channel>(segment, &mut state)?,
                EntityKind::Videos => self.load_segment::<Video>(segment, &mut state)?,
                EntityKind::Comments => self.load_segment::<Comment>(segment, &mut state)?,
            }
        }
        Ok(state)
    }

    fn load_segment<R: Record>(&self, segment: &Segment, state: &mut CollectionState) -> Result<()> {
        let rows = self.read_segment::<R>(segment)?;
        R::table_mut(&mut state.accumulator).load(rows);
        Ok(())
    }

    /// Remove segment files the manifest does not reference
    fn remove_orphans(&self) -> Result<usize> {
        let referenced: HashSet<&str> = self
            .manifest
            .segments
            .iter()
            .map(|s| s.file.as_str())
            .collect();

        let pattern = self.segment_dir().join("*.parquet");
        let mut removed = 0;
        for path in glob::glob(&pattern.to_string_lossy())
            .context("invalid glob pattern")?
            .filter_map(|e| e.ok())
        {
            let orphan = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_none_or(|n| !referenced.contains(n));
            if orphan {
                log::warn!("Removing unreferenced segment {}", path.display());
                fs::remove_file(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
