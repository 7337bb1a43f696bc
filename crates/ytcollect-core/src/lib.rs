//! ytcollect core - shared infrastructure for the collector crates
//!
//! Logging, progress reporting, graceful shutdown, retry with backoff
//! and the atomic parquet sink used by the checkpoint store.

pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod sink;

// Re-exports for convenience
pub use logging::{IndicatifLogger, init_logging, log_file_name};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::{RetryPolicy, Retryable, retry_with_backoff};
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown, shutdown_flag};
pub use sink::{
    ParquetSink, cleanup_tmp_files, is_valid_parquet, sync_parent_dir, tmp_path_for,
    write_file_atomic,
};
