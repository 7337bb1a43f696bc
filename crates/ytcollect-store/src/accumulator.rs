//! Entity accumulator - deduplicating, insertion-ordered tables

use rustc_hash::FxHashMap;

use crate::record::{Channel, Comment, EntityKind, Record, Video};

/// Insertion-ordered table of records, unique by key.
///
/// The first record seen for a key wins; later records with the same key are
/// dropped. Rows below `persisted` are already part of a durable checkpoint.
#[derive(Debug, Clone)]
pub struct Table<R> {
    rows: Vec<R>,
    index: FxHashMap<String, usize>,
    by_parent: FxHashMap<String, Vec<usize>>,
    persisted: usize,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: FxHashMap::default(),
            by_parent: FxHashMap::default(),
            persisted: 0,
        }
    }
}

impl<R: Record> Table<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one record; returns `false` if its key is already present
    pub fn insert(&mut self, mut row: R) -> bool {
        if self.index.contains_key(row.key()) {
            return false;
        }
        row.normalize();
        let idx = self.rows.len();
        self.index.insert(row.key().to_string(), idx);
        if let Some(parent) = row.parent_key() {
            self.by_parent
                .entry(parent.to_string())
                .or_default()
                .push(idx);
        }
        self.rows.push(row);
        true
    }

    /// Insert a page of records, returning how many were new
    pub fn merge(&mut self, page: impl IntoIterator<Item = R>) -> usize {
        page.into_iter()
            .map(|row| self.insert(row))
            .filter(|&added| added)
            .count()
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        self.index.get(key).map(|&i| &self.rows[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// All rows in first-arrival order
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Rows owned by `parent`, in first-arrival order
    pub fn children<'a>(&'a self, parent: &str) -> impl Iterator<Item = &'a R> + 'a {
        self.by_parent
            .get(parent)
            .map(|idx| idx.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.rows[i])
    }

    pub fn count_children(&self, parent: &str) -> usize {
        self.by_parent.get(parent).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows added since the last checkpoint
    pub fn unpersisted(&self) -> &[R] {
        &self.rows[self.persisted..]
    }

    pub fn mark_persisted(&mut self) {
        self.persisted = self.rows.len();
    }

    /// Load rows read back from a checkpoint; they count as persisted.
    pub(crate) fn load(&mut self, rows: Vec<R>) -> usize {
        let added = self.merge(rows);
        self.mark_persisted();
        added
    }
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub channels: usize,
    pub videos: usize,
    pub comments: usize,
}

impl EntityCounts {
    pub fn get(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Channels => self.channels,
            EntityKind::Videos => self.videos,
            EntityKind::Comments => self.comments,
        }
    }
}

/// The growing channel / video / comment tables of one collection.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    pub(crate) channels: Table<Channel>,
    pub(crate) videos: Table<Video>,
    pub(crate) comments: Table<Comment>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a page of records into their table, returning the number of new rows.
    ///
    /// Records whose key is already present are skipped (first write wins).
    pub fn merge<R: Record>(&mut self, page: Vec<R>) -> usize {
        let added = R::table_mut(self).merge(page);
        log::debug!("merged {added} new {}", R::KIND);
        added
    }

    pub fn table<R: Record>(&self) -> &Table<R> {
        R::table(self)
    }

    pub fn get<R: Record>(&self, key: &str) -> Option<&R> {
        R::table(self).get(key)
    }

    pub fn channels(&self) -> &[Channel] {
        self.channels.rows()
    }

    pub fn videos(&self) -> &[Video] {
        self.videos.rows()
    }

    pub fn comments(&self) -> &[Comment] {
        self.comments.rows()
    }

    /// Videos of a channel, newest-first as listed by the uploads playlist
    pub fn videos_of<'a>(&'a self, channel_id: &str) -> impl Iterator<Item = &'a Video> + 'a {
        self.videos.children(channel_id)
    }

    /// Comments (top-level and replies) of a video
    pub fn comments_of<'a>(&'a self, video_id: &str) -> impl Iterator<Item = &'a Comment> + 'a {
        self.comments.children(video_id)
    }

    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            channels: self.channels.len(),
            videos: self.videos.len(),
            comments: self.comments.len(),
        }
    }

    /// Whether any table holds rows not yet covered by a checkpoint
    pub fn has_unpersisted(&self) -> bool {
        !self.channels.unpersisted().is_empty()
            || !self.videos.unpersisted().is_empty()
            || !self.comments.unpersisted().is_empty()
    }

    pub fn mark_persisted(&mut self) {
        self.channels.mark_persisted();
        self.videos.mark_persisted();
        self.comments.mark_persisted();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn video(id: &str, channel: &str, title: &str) -> Video {
        Video {
            video_id: id.into(),
            channel_id: channel.into(),
            published_at: ts(1_646_000_000),
            title: title.into(),
            description: String::new(),
            duration: Some("PT1M".into()),
            dimension: Some("2d".into()),
            view_count: Some(10),
            like_count: None,
            favorite_count: Some(0),
            comment_count: Some(0),
            region_blocked: vec![],
        }
    }

    #[test]
    fn merge_counts_only_new_rows() {
        let mut acc = Accumulator::new();
        let page = vec![video("a", "ch", "A"), video("b", "ch", "B")];
        assert_eq!(acc.merge(page.clone()), 2);
        assert_eq!(acc.merge(page), 0);
        assert_eq!(acc.counts().videos, 2);
    }

    #[test]
    fn first_write_wins() {
        let mut acc = Accumulator::new();
        acc.merge(vec![video("a", "ch", "original")]);
        acc.merge(vec![video("a", "ch", "changed")]);
        assert_eq!(acc.get::<Video>("a").unwrap().title, "original");
    }

    #[test]
    fn duplicates_within_one_page() {
        let mut acc = Accumulator::new();
        let added = acc.merge(vec![video("a", "ch", "1"), video("a", "ch", "2")]);
        assert_eq!(added, 1);
        assert_eq!(acc.videos()[0].title, "1");
    }

    #[test]
    fn insertion_order_kept() {
        let mut acc = Accumulator::new();
        acc.merge(vec![video("c", "ch", ""), video("a", "ch", "")]);
        acc.merge(vec![video("b", "ch", ""), video("a", "ch", "")]);
        let ids: Vec<_> = acc.videos().iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn children_grouped_by_parent() {
        let mut acc = Accumulator::new();
        acc.merge(vec![
            video("a", "ch1", ""),
            video("b", "ch2", ""),
            video("c", "ch1", ""),
        ]);
        let ids: Vec<_> = acc.videos_of("ch1").map(|v| v.video_id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(acc.videos_of("missing").count(), 0);
        assert_eq!(acc.table::<Video>().count_children("ch2"), 1);
    }

    #[test]
    fn unpersisted_tail_tracks_checkpoints() {
        let mut acc = Accumulator::new();
        acc.merge(vec![video("a", "ch", "")]);
        assert!(acc.has_unpersisted());
        acc.mark_persisted();
        assert!(!acc.has_unpersisted());

        acc.merge(vec![video("a", "ch", ""), video("b", "ch", "")]);
        let tail = acc.table::<Video>().unpersisted();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].video_id, "b");
    }
}
