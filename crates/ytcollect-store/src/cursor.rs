//! Pagination cursor tracker - where each listing left off

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which paginated listing a cursor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorKind {
    /// A channel's uploads playlist (parent = channel id)
    Uploads,
    /// Top-level comment threads of a video (parent = video id)
    CommentThreads,
    /// Replies in a comment thread (parent = thread id)
    Replies,
}

impl CursorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Uploads => "uploads",
            Self::CommentThreads => "comment_threads",
            Self::Replies => "replies",
        }
    }
}

impl fmt::Display for CursorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress of one listing. A listing without a cursor starts from page one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// More pages remain; request this continuation token next
    Next(String),
    /// Every page has been merged
    Exhausted,
}

/// Persisted form of one cursor; `next_token: null` marks an exhausted listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorEntry {
    pub kind: CursorKind,
    pub parent_id: String,
    pub next_token: Option<String>,
}

/// Cursor per `(kind, parent id)`.
///
/// Only advance a cursor for a page whose records are already merged; the
/// checkpoint store persists the tracker together with those records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CursorEntry>", into = "Vec<CursorEntry>")]
pub struct CursorTracker {
    cursors: BTreeMap<CursorKind, BTreeMap<String, CursorState>>,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cursor, `None` meaning "start from the beginning"
    pub fn get_cursor(&self, kind: CursorKind, parent_id: &str) -> Option<&CursorState> {
        self.cursors.get(&kind)?.get(parent_id)
    }

    /// Continuation token for the next request (`None` = first page)
    pub fn page_token(&self, kind: CursorKind, parent_id: &str) -> Option<&str> {
        match self.get_cursor(kind, parent_id) {
            Some(CursorState::Next(token)) => Some(token),
            _ => None,
        }
    }

    pub fn is_exhausted(&self, kind: CursorKind, parent_id: &str) -> bool {
        matches!(
            self.get_cursor(kind, parent_id),
            Some(CursorState::Exhausted)
        )
    }

    /// Record the token following a merged page; `None` marks the listing exhausted
    pub fn advance(&mut self, kind: CursorKind, parent_id: &str, next_token: Option<String>) {
        let state = match next_token {
            Some(token) => CursorState::Next(token),
            None => CursorState::Exhausted,
        };
        self.cursors
            .entry(kind)
            .or_default()
            .insert(parent_id.to_string(), state);
    }

    pub fn mark_exhausted(&mut self, kind: CursorKind, parent_id: &str) {
        self.advance(kind, parent_id, None);
    }

    /// Number of exhausted listings of one kind
    pub fn count_exhausted(&self, kind: CursorKind) -> usize {
        self.cursors.get(&kind).map_or(0, |m| {
            m.values()
                .filter(|s| matches!(s, CursorState::Exhausted))
                .count()
        })
    }

    pub fn len(&self) -> usize {
        self.cursors.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<CursorEntry>> for CursorTracker {
    fn from(entries: Vec<CursorEntry>) -> Self {
        let mut tracker = Self::new();
        for e in entries {
            tracker.advance(e.kind, &e.parent_id, e.next_token);
        }
        tracker
    }
}

impl From<CursorTracker> for Vec<CursorEntry> {
    fn from(tracker: CursorTracker) -> Self {
        tracker
            .cursors
            .into_iter()
            .flat_map(|(kind, m)| {
                m.into_iter().map(move |(parent_id, state)| CursorEntry {
                    kind,
                    parent_id,
                    next_token: match state {
                        CursorState::Next(token) => Some(token),
                        CursorState::Exhausted => None,
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cursor_means_start() {
        let t = CursorTracker::new();
        assert!(t.get_cursor(CursorKind::Uploads, "UC1").is_none());
        assert!(t.page_token(CursorKind::Uploads, "UC1").is_none());
        assert!(!t.is_exhausted(CursorKind::Uploads, "UC1"));
    }

    #[test]
    fn advance_then_exhaust() {
        let mut t = CursorTracker::new();
        t.advance(CursorKind::Uploads, "UC1", Some("EAAa".into()));
        assert_eq!(t.page_token(CursorKind::Uploads, "UC1"), Some("EAAa"));

        t.advance(CursorKind::Uploads, "UC1", None);
        assert!(t.is_exhausted(CursorKind::Uploads, "UC1"));
        assert!(t.page_token(CursorKind::Uploads, "UC1").is_none());
        assert_eq!(t.count_exhausted(CursorKind::Uploads), 1);
    }

    #[test]
    fn kinds_are_independent() {
        let mut t = CursorTracker::new();
        t.mark_exhausted(CursorKind::CommentThreads, "same-id");
        assert!(!t.is_exhausted(CursorKind::Replies, "same-id"));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn serde_roundtrip() {
        let mut t = CursorTracker::new();
        t.advance(CursorKind::Uploads, "UC1", Some("tok".into()));
        t.mark_exhausted(CursorKind::CommentThreads, "vid1");
        t.advance(CursorKind::Replies, "thr1", Some("r2".into()));

        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"next_token\":\"tok\""));
        assert!(json.contains("\"next_token\":null"));
        let back: CursorTracker = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
