//! Logging with indicatif integration and an optional audit log file

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use indicatif::MultiProgress;

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Logger that prints through indicatif MultiProgress to avoid mixing with progress bars.
///
/// When a log file is attached, every record that passes the terminal filter
/// is also appended to it with a timestamp, so a collection run leaves a
/// durable trail next to its data.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: Option<MultiProgress>,
    file: Option<Mutex<File>>,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: Option<MultiProgress>, file: Option<File>) -> Self {
        Self {
            inner,
            multi,
            file: file.map(Mutex::new),
        }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        match &self.multi {
            Some(multi) => {
                let (pre, label, post) = level_style(record.level(), true);
                let line = format!("[{pre}{label}{post}] {}", record.args());
                multi.suspend(|| eprintln!("{line}"));
            }
            None => {
                let (_, label, _) = level_style(record.level(), false);
                eprintln!("[{label}] {}", record.args());
            }
        }
        if let Some(file) = &self.file {
            let (_, label, _) = level_style(record.level(), false);
            let ts = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
            if let Ok(mut f) = file.lock() {
                // A failing log file must never take the collector down
                let _ = writeln!(f, "{ts} [{label}] {}: {}", record.target(), record.args());
            }
        }
    }

    fn flush(&self) {
        self.inner.flush();
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

/// Initialize logging.
///
/// `multi` is set in TTY mode so log lines are printed above progress bars.
/// `log_file`, when given, receives a timestamped copy of every record.
pub fn init_logging(
    quiet: bool,
    debug: bool,
    multi: Option<&MultiProgress>,
    log_file: Option<&Path>,
) -> std::io::Result<()> {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Some(OpenOptions::new().create(true).append(true).open(path)?)
        }
        None => None,
    };

    let logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .build();
    let max_level = logger.filter();

    log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.cloned(), file)))
        .map_err(std::io::Error::other)?;
    log::set_max_level(max_level);
    Ok(())
}

/// Default audit log filename for a run started now: `log-ytcollect-YYMMDD_HHMM.log`
pub fn log_file_name() -> String {
    format!(
        "log-ytcollect-{}.log",
        chrono::Local::now().format("%y%m%d_%H%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_labels_are_padded() {
        for level in [
            log::Level::Error,
            log::Level::Warn,
            log::Level::Info,
            log::Level::Debug,
            log::Level::Trace,
        ] {
            let (_, label, _) = level_style(level, false);
            assert_eq!(label.len(), 5);
        }
    }

    #[test]
    fn no_color_has_no_escape_codes() {
        let (pre, _, post) = level_style(log::Level::Error, false);
        assert!(pre.is_empty());
        assert!(post.is_empty());
    }

    #[test]
    fn log_file_name_shape() {
        let name = log_file_name();
        assert!(name.starts_with("log-ytcollect-"));
        assert!(name.ends_with(".log"));
    }
}
