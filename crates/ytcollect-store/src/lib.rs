//! ytcollect-store: in-memory entity tables and their durable checkpoints
//!
//! The collector accumulates channels, videos and comments into
//! [`Accumulator`] tables, remembers pagination progress in a
//! [`CursorTracker`], and makes both durable together through the
//! [`CheckpointStore`]. Every run appends an audit line to the [`RunLog`].

pub mod accumulator;
pub mod batch;
pub mod checkpoint;
pub mod cursor;
pub mod export;
pub mod hash;
pub mod record;
pub mod run_log;
pub mod schema;

pub use accumulator::{Accumulator, EntityCounts, Table};
pub use checkpoint::{CheckpointStore, CollectionState, Manifest, Segment};
pub use cursor::{CursorKind, CursorState, CursorTracker};
pub use export::{ExportedTable, export_tables};
pub use record::{Channel, Comment, EntityKind, Record, Video, stored_precision};
pub use run_log::{ChannelCounts, HaltPoint, RecordScope, RunLog, RunRecord, RunStatus};
