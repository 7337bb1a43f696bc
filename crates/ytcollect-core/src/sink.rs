//! Atomic file output - parquet writer and small-file replace, both tmp→rename
//! followed by an fsync of the containing directory

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

/// Path of the temporary sibling used while `path` is being written
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Buffered parquet writer with atomic tmp→rename
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    row_count: usize,
}

impl std::fmt::Debug for ParquetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSink")
            .field("final_path", &self.final_path)
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

impl ParquetSink {
    /// Create a new sink writing to `{final_path}.tmp`
    pub fn new(final_path: &Path, schema: &Arc<Schema>, zstd_level: i32) -> io::Result<Self> {
        let tmp_path = tmp_path_for(final_path);

        // Clean up stale tmp file
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let file = File::create(&tmp_path)?;
        let level = ZstdLevel::try_new(zstd_level)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(level))
            .build();

        let writer =
            ArrowWriter::try_new(file, schema.clone(), Some(props)).map_err(io::Error::other)?;

        Ok(Self {
            writer,
            tmp_path,
            final_path: final_path.to_path_buf(),
            row_count: 0,
        })
    }

    /// Write a record batch
    pub fn write_batch(&mut self, batch: &RecordBatch) -> io::Result<()> {
        self.row_count += batch.num_rows();
        self.writer.write(batch).map_err(io::Error::other)
    }

    /// Finalize: write footer, fsync, and atomically rename tmp → final
    pub fn finalize(self) -> io::Result<usize> {
        let row_count = self.row_count;
        let file = self.writer.into_inner().map_err(io::Error::other)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.tmp_path, &self.final_path)?;
        sync_parent_dir(&self.final_path)?;
        Ok(row_count)
    }
}

/// Replace `path` with `contents` so readers see either the old or the new file.
pub fn write_file_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = tmp_path_for(path);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    sync_parent_dir(path)
}

/// Directory holding `path`; a bare file name lives in the working directory
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Fsync the directory holding `path` so a completed rename survives a crash
pub fn sync_parent_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    File::open(parent_dir(path))?.sync_all()?;
    #[cfg(not(unix))]
    let _ = parent_dir(path);
    Ok(())
}

/// Check if a completed parquet file exists and has a valid footer
pub fn is_valid_parquet(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    parquet::file::reader::SerializedFileReader::new(file).is_ok()
}

/// Remove stale .tmp files in a directory, returning how many were removed
pub fn cleanup_tmp_files(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field};
    use tempfile::TempDir;

    fn id_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]))
    }

    #[test]
    fn tmp_path_appends_suffix() {
        let p = Path::new("/data/segments/videos-000001.parquet");
        assert_eq!(
            tmp_path_for(p),
            PathBuf::from("/data/segments/videos-000001.parquet.tmp")
        );
    }

    #[test]
    fn sink_renames_on_finalize() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ids.parquet");
        let schema = id_schema();
        let batch =
            RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(vec![1, 2, 3]))])
                .unwrap();

        let mut sink = ParquetSink::new(&path, &schema, 3).unwrap();
        sink.write_batch(&batch).unwrap();
        assert!(!path.exists());
        assert!(tmp_path_for(&path).exists());

        assert_eq!(sink.finalize().unwrap(), 3);
        assert!(is_valid_parquet(&path));
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn is_valid_parquet_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.parquet");
        std::fs::write(&path, b"this is not parquet").unwrap();
        assert!(!is_valid_parquet(&path));
        assert!(!is_valid_parquet(&dir.path().join("missing.parquet")));
    }

    #[test]
    fn write_file_atomic_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        write_file_atomic(&path, b"{\"generation\":1}").unwrap();
        write_file_atomic(&path, b"{\"generation\":2}").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{\"generation\":2}");
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn parent_dir_of_bare_name_is_cwd() {
        assert_eq!(parent_dir(Path::new("state.json")), Path::new("."));
        assert_eq!(parent_dir(Path::new("data/state.json")), Path::new("data"));
    }

    #[test]
    fn sync_parent_dir_after_rename() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("segments").join("videos-000001.parquet");
        std::fs::create_dir(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"x").unwrap();
        sync_parent_dir(&path).unwrap();

        #[cfg(unix)]
        assert!(sync_parent_dir(&dir.path().join("gone").join("state.json")).is_err());
    }

    #[test]
    fn cleanup_tmp_files_removes_only_tmp() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.parquet.tmp"), b"stale").unwrap();
        std::fs::write(dir.path().join("b.parquet"), b"keep").unwrap();

        assert_eq!(cleanup_tmp_files(dir.path()).unwrap(), 1);
        assert!(!dir.path().join("a.parquet.tmp").exists());
        assert!(dir.path().join("b.parquet").exists());
    }
}
