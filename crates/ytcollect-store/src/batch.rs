//! Conversion between record slices and Arrow `RecordBatch`es

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::*;
use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use chrono::{DateTime, Utc};

use crate::record::{Channel, Comment, Video};
use crate::schema;

/// Rows per `RecordBatch` when writing a table.
pub const RECORD_BATCH_SIZE: usize = 8192;

/// Records that can be stored as columns.
///
/// `from_batch(to_batch(rows)) == rows` must hold for every table, which is
/// what makes a checkpoint load back exactly what was held in memory.
pub trait Columnar: Sized {
    fn schema() -> &'static Arc<Schema>;

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError>;

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>>;
}

// === Column readers ===

fn column<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .with_context(|| format!("missing column `{name}`"))?
        .as_any()
        .downcast_ref::<A>()
        .with_context(|| format!("column `{name}` has an unexpected type"))
}

fn opt_string(arr: &StringArray, i: usize) -> Option<String> {
    (!arr.is_null(i)).then(|| arr.value(i).to_string())
}

fn opt_i64(arr: &Int64Array, i: usize) -> Option<i64> {
    (!arr.is_null(i)).then(|| arr.value(i))
}

fn timestamp(arr: &TimestampMicrosecondArray, i: usize) -> Result<DateTime<Utc>> {
    let micros = arr.value(i);
    DateTime::from_timestamp_micros(micros)
        .with_context(|| format!("timestamp out of range: {micros}"))
}

fn string_list(arr: &ListArray, i: usize) -> Result<Vec<String>> {
    let values = arr.value(i);
    let strings = values
        .as_any()
        .downcast_ref::<StringArray>()
        .context("list items are not strings")?;
    Ok(strings.iter().flatten().map(str::to_string).collect())
}

// === Column builders ===

fn utc_timestamps(values: impl IntoIterator<Item = i64>) -> ArrayRef {
    Arc::new(TimestampMicrosecondArray::from_iter_values(values).with_timezone("UTC"))
}

impl Columnar for Channel {
    fn schema() -> &'static Arc<Schema> {
        schema::channels()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.channel_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.name.as_str()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.title.as_deref()))),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.uploads_playlist_id.as_deref()),
            )),
        ];
        RecordBatch::try_new(Self::schema().clone(), arrays)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let channel_id = column::<StringArray>(batch, "channel_id")?;
        let name = column::<StringArray>(batch, "name")?;
        let title = column::<StringArray>(batch, "title")?;
        let uploads = column::<StringArray>(batch, "uploads_playlist_id")?;

        Ok((0..batch.num_rows())
            .map(|i| Channel {
                channel_id: channel_id.value(i).to_string(),
                name: name.value(i).to_string(),
                title: opt_string(title, i),
                uploads_playlist_id: opt_string(uploads, i),
            })
            .collect())
    }
}

impl Columnar for Video {
    fn schema() -> &'static Arc<Schema> {
        schema::videos()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let mut region_blocked = ListBuilder::new(StringBuilder::new());
        for row in rows {
            for region in &row.region_blocked {
                region_blocked.values().append_value(region);
            }
            region_blocked.append(true);
        }

        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.video_id.as_str()))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.channel_id.as_str()),
            )),
            utc_timestamps(rows.iter().map(|r| r.published_at.timestamp_micros())),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.title.as_str()))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.description.as_str()),
            )),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.duration.as_deref()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.dimension.as_deref()))),
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.view_count))),
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.like_count))),
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.favorite_count))),
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.comment_count))),
            Arc::new(region_blocked.finish()),
        ];
        RecordBatch::try_new(Self::schema().clone(), arrays)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let video_id = column::<StringArray>(batch, "video_id")?;
        let channel_id = column::<StringArray>(batch, "channel_id")?;
        let published_at = column::<TimestampMicrosecondArray>(batch, "published_at")?;
        let title = column::<StringArray>(batch, "title")?;
        let description = column::<StringArray>(batch, "description")?;
        let duration = column::<StringArray>(batch, "duration")?;
        let dimension = column::<StringArray>(batch, "dimension")?;
        let view_count = column::<Int64Array>(batch, "view_count")?;
        let like_count = column::<Int64Array>(batch, "like_count")?;
        let favorite_count = column::<Int64Array>(batch, "favorite_count")?;
        let comment_count = column::<Int64Array>(batch, "comment_count")?;
        let region_blocked = column::<ListArray>(batch, "region_blocked")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(Video {
                    video_id: video_id.value(i).to_string(),
                    channel_id: channel_id.value(i).to_string(),
                    published_at: timestamp(published_at, i)?,
                    title: title.value(i).to_string(),
                    description: description.value(i).to_string(),
                    duration: opt_string(duration, i),
                    dimension: opt_string(dimension, i),
                    view_count: opt_i64(view_count, i),
                    like_count: opt_i64(like_count, i),
                    favorite_count: opt_i64(favorite_count, i),
                    comment_count: opt_i64(comment_count, i),
                    region_blocked: string_list(region_blocked, i)?,
                })
            })
            .collect()
    }
}

impl Columnar for Comment {
    fn schema() -> &'static Arc<Schema> {
        schema::comments()
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.comment_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.video_id.as_str()))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.thread_id.as_str()),
            )),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.parent_id.as_deref()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.author.as_str()))),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.author_channel_id.as_deref()),
            )),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.author_channel_url.as_deref()),
            )),
            Arc::new(StringArray::from_iter(
                rows.iter().map(|r| r.author_profile_image_url.as_deref()),
            )),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.text.as_str()))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.text_original.as_str()),
            )),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.like_count))),
            utc_timestamps(rows.iter().map(|r| r.published_at.timestamp_micros())),
            utc_timestamps(rows.iter().map(|r| r.updated_at.timestamp_micros())),
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.total_reply_count))),
        ];
        RecordBatch::try_new(Self::schema().clone(), arrays)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let comment_id = column::<StringArray>(batch, "comment_id")?;
        let video_id = column::<StringArray>(batch, "video_id")?;
        let thread_id = column::<StringArray>(batch, "thread_id")?;
        let parent_id = column::<StringArray>(batch, "parent_id")?;
        let author = column::<StringArray>(batch, "author")?;
        let author_channel_id = column::<StringArray>(batch, "author_channel_id")?;
        let author_channel_url = column::<StringArray>(batch, "author_channel_url")?;
        let author_profile_image_url = column::<StringArray>(batch, "author_profile_image_url")?;
        let text = column::<StringArray>(batch, "text")?;
        let text_original = column::<StringArray>(batch, "text_original")?;
        let like_count = column::<Int64Array>(batch, "like_count")?;
        let published_at = column::<TimestampMicrosecondArray>(batch, "published_at")?;
        let updated_at = column::<TimestampMicrosecondArray>(batch, "updated_at")?;
        let total_reply_count = column::<Int64Array>(batch, "total_reply_count")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(Comment {
                    comment_id: comment_id.value(i).to_string(),
                    video_id: video_id.value(i).to_string(),
                    thread_id: thread_id.value(i).to_string(),
                    parent_id: opt_string(parent_id, i),
                    author: author.value(i).to_string(),
                    author_channel_id: opt_string(author_channel_id, i),
                    author_channel_url: opt_string(author_channel_url, i),
                    author_profile_image_url: opt_string(author_profile_image_url, i),
                    text: text.value(i).to_string(),
                    text_original: text_original.value(i).to_string(),
                    like_count: like_count.value(i),
                    published_at: timestamp(published_at, i)?,
                    updated_at: timestamp(updated_at, i)?,
                    total_reply_count: opt_i64(total_reply_count, i),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn channels_batch_roundtrip_with_nulls() {
        let rows = vec![
            Channel {
                channel_id: "UC1".into(),
                name: "ria-news".into(),
                title: Some("РИА Новости".into()),
                uploads_playlist_id: Some("UU1".into()),
            },
            Channel {
                channel_id: "UC2".into(),
                name: "empty".into(),
                title: None,
                uploads_playlist_id: None,
            },
        ];
        let batch = Channel::to_batch(&rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(Channel::from_batch(&batch).unwrap(), rows);
    }

    #[test]
    fn videos_keep_region_lists() {
        let base = Video {
            video_id: "v1".into(),
            channel_id: "UC1".into(),
            published_at: ts(1_645_000_000),
            title: "t".into(),
            description: "d".into(),
            duration: Some("PT4M13S".into()),
            dimension: Some("2d".into()),
            view_count: Some(1000),
            like_count: None,
            favorite_count: Some(0),
            comment_count: None,
            region_blocked: vec!["UA".into(), "PL".into()],
        };
        let rows = vec![
            base.clone(),
            Video {
                video_id: "v2".into(),
                region_blocked: vec![],
                ..base
            },
        ];
        let back = Video::from_batch(&Video::to_batch(&rows).unwrap()).unwrap();
        assert_eq!(back, rows);
        assert_eq!(back[0].region_blocked, ["UA", "PL"]);
        assert!(back[1].region_blocked.is_empty());
    }

    #[test]
    fn empty_batch() {
        let batch = Comment::to_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert!(Comment::from_batch(&batch).unwrap().is_empty());
    }

    #[test]
    fn from_batch_rejects_wrong_schema() {
        let batch = Channel::to_batch(&[]).unwrap();
        let err = Video::from_batch(&batch).unwrap_err();
        assert!(err.to_string().contains("missing column"));
    }
}
