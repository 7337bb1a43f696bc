use chrono::DateTime;
use ytcollect_store::{Accumulator, CheckpointStore, Comment};

fn synthetic_comments(n: usize, offset: usize) -> Vec<Comment> {
    let ts = DateTime::from_timestamp(1_646_000_000, 0).unwrap();
    (offset..offset + n)
        .map(|i| Comment {
            comment_id: format!("Ugz{i:08}"),
            video_id: format!("vid{:04}", i / 100),
            thread_id: format!("Ugz{i:08}"),
            parent_id: None,
            author: format!("author {i}"),
            author_channel_id: Some(format!("UC{i}")),
            author_channel_url: Some(format!("http://www.youtube.com/channel/UC{i}")),
            author_profile_image_url: None,
            text: "Comment text for benchmarking".into(),
            text_original: "Comment text for benchmarking".into(),
            like_count: (i % 17) as i64,
            published_at: ts,
            updated_at: ts,
            total_reply_count: Some(0),
        })
        .collect()
}

/// Pages of 100 with half the rows already present
#[divan::bench(args = [1_000, 10_000, 100_000])]
fn merge_overlapping_pages(bencher: divan::Bencher, n: usize) {
    let pages: Vec<Vec<Comment>> = (0..n / 50)
        .map(|p| synthetic_comments(100, p * 50))
        .collect();
    bencher.bench(|| {
        let mut acc = Accumulator::new();
        for page in pages.iter().cloned() {
            acc.merge(page);
        }
        acc.counts()
    });
}

#[divan::bench(args = [1, 3, 6])]
fn checkpoint_commit(bencher: divan::Bencher, zstd_level: i32) {
    let page = synthetic_comments(8192, 0);
    bencher.bench(|| {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, mut state) = CheckpointStore::open(dir.path(), zstd_level).unwrap();
        state.accumulator.merge(page.clone());
        store.commit(&mut state).unwrap();
    });
}

fn main() {
    divan::main();
}
