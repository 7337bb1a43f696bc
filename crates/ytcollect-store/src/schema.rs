//! Arrow schema definitions for the collected tables

use std::sync::{Arc, LazyLock};

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

fn utc_micros() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// channels.parquet - one row per requested channel
pub fn channels() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("channel_id", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, true),
            Field::new("uploads_playlist_id", DataType::Utf8, true),
        ]))
    });
    &SCHEMA
}

/// videos.parquet - uploads playlist items joined with video details
pub fn videos() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("video_id", DataType::Utf8, false),
            Field::new("channel_id", DataType::Utf8, false),
            Field::new("published_at", utc_micros(), false),
            Field::new("title", DataType::Utf8, false),
            Field::new("description", DataType::Utf8, false),
            Field::new("duration", DataType::Utf8, true),
            Field::new("dimension", DataType::Utf8, true),
            Field::new("view_count", DataType::Int64, true),
            Field::new("like_count", DataType::Int64, true),
            Field::new("favorite_count", DataType::Int64, true),
            Field::new("comment_count", DataType::Int64, true),
            Field::new(
                "region_blocked",
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
                false,
            ),
        ]))
    });
    &SCHEMA
}

/// comments.parquet - top-level comments and replies
pub fn comments() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("comment_id", DataType::Utf8, false),
            Field::new("video_id", DataType::Utf8, false),
            Field::new("thread_id", DataType::Utf8, false),
            Field::new("parent_id", DataType::Utf8, true),
            Field::new("author", DataType::Utf8, false),
            Field::new("author_channel_id", DataType::Utf8, true),
            Field::new("author_channel_url", DataType::Utf8, true),
            Field::new("author_profile_image_url", DataType::Utf8, true),
            Field::new("text", DataType::Utf8, false),
            Field::new("text_original", DataType::Utf8, false),
            Field::new("like_count", DataType::Int64, false),
            Field::new("published_at", utc_micros(), false),
            Field::new("updated_at", utc_micros(), false),
            Field::new("total_reply_count", DataType::Int64, true),
        ]))
    });
    &SCHEMA
}
