//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif spinner line per channel being collected.
//! Non-TTY mode: progress lines go through the logger instead.

use std::io::IsTerminal;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Central progress context managing multi-progress lines.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
    /// Lines passed to `println`, kept only by `recording()` contexts
    recorded: Option<Mutex<Vec<String>>>,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            is_tty,
            recorded: None,
        }
    }

    /// Context that never draws (tests, library callers without a terminal).
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden()),
            is_tty: false,
            recorded: None,
        }
    }

    /// Hidden context that keeps every reported line for `lines()`.
    pub fn recording() -> Self {
        Self {
            recorded: Some(Mutex::new(Vec::new())),
            ..Self::hidden()
        }
    }

    /// Lines reported so far. Empty unless created with `recording()`.
    pub fn lines(&self) -> Vec<String> {
        match &self.recorded {
            Some(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Create a status line with a spinner for one collection stage.
    ///
    /// Update with `pb.set_message(...)` as pages arrive and call
    /// `pb.finish_and_clear()` when the channel is done.
    /// Non-TTY: hidden (no-op).
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:<20.cyan.bold} {wide_msg}")
                .expect("invalid template"),
        );
        // Truncate long names to keep lines aligned
        let display: String = name.chars().take(20).collect();
        pb.set_prefix(display);
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Report a progress line.
    ///
    /// TTY: shown above the spinners. Non-TTY: logged at info level so the
    /// line also lands in the audit log file.
    pub fn println(&self, msg: impl AsRef<str>) {
        if let Some(lines) = &self.recorded {
            if let Ok(mut lines) = lines.lock() {
                lines.push(msg.as_ref().to_string());
            }
        }
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            log::info!("{}", msg.as_ref());
        }
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_num_small() {
        assert_eq!(fmt_num(0), "0");
        assert_eq!(fmt_num(7), "7");
        assert_eq!(fmt_num(165), "165");
    }

    #[test]
    fn fmt_num_thousands() {
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(12_345), "12,345");
        assert_eq!(fmt_num(1_234_567), "1,234,567");
    }

    #[test]
    fn hidden_context_is_not_tty() {
        let ctx = ProgressContext::hidden();
        assert!(!ctx.is_tty());
        let pb = ctx.stage_line("sputnik");
        assert!(pb.is_hidden());
    }

    #[test]
    fn recording_context_keeps_lines() {
        let ctx = ProgressContext::recording();
        ctx.println("3/3 videos collected for channel = sputnik");
        ctx.println(String::from("done"));
        assert_eq!(
            ctx.lines(),
            ["3/3 videos collected for channel = sputnik", "done"]
        );
        assert!(ProgressContext::hidden().lines().is_empty());
    }
}
