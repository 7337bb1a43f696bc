//! Export of the accumulated tables as one parquet file each

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ytcollect_core::ParquetSink;

use crate::accumulator::Accumulator;
use crate::batch::RECORD_BATCH_SIZE;
use crate::record::{Channel, Comment, EntityKind, Record, Video};

/// One written table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedTable {
    pub kind: EntityKind,
    pub path: PathBuf,
    pub rows: usize,
}

/// Write `channels.parquet`, `videos.parquet` and `comments.parquet` into `out_dir`.
///
/// Empty tables are still written so downstream readers find every file.
pub fn export_tables(acc: &Accumulator, out_dir: &Path, zstd_level: i32) -> Result<Vec<ExportedTable>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    Ok(vec![
        export_table::<Channel>(acc, out_dir, zstd_level)?,
        export_table::<Video>(acc, out_dir, zstd_level)?,
        export_table::<Comment>(acc, out_dir, zstd_level)?,
    ])
}

fn export_table<R: Record>(acc: &Accumulator, out_dir: &Path, zstd_level: i32) -> Result<ExportedTable> {
    let path = out_dir.join(format!("{}.parquet", R::KIND));
    let mut sink = ParquetSink::new(&path, R::schema(), zstd_level)
        .with_context(|| format!("failed to create {}", path.display()))?;

    for chunk in acc.table::<R>().rows().chunks(RECORD_BATCH_SIZE) {
        let batch = R::to_batch(chunk).with_context(|| format!("failed to build {} batch", R::KIND))?;
        sink.write_batch(&batch)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    let rows = sink
        .finalize()
        .with_context(|| format!("failed to finalize {}", path.display()))?;
    log::info!("Exported {rows} {} to {}", R::KIND, path.display());

    Ok(ExportedTable {
        kind: R::KIND,
        path,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::file::reader::{FileReader, SerializedFileReader};

    #[test]
    fn writes_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut acc = Accumulator::new();
        acc.merge(vec![Channel {
            channel_id: "UC1".into(),
            name: "ria-news".into(),
            title: None,
            uploads_playlist_id: None,
        }]);

        let out = dir.path().join("export");
        let tables = export_tables(&acc, &out, 3).unwrap();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[0].rows, 1);
        assert_eq!(tables[1].rows, 0);

        let file = fs::File::open(out.join("channels.parquet")).unwrap();
        let reader = SerializedFileReader::new(file).unwrap();
        assert_eq!(reader.metadata().file_metadata().num_rows(), 1);
        assert!(out.join("comments.parquet").exists());
    }
}
