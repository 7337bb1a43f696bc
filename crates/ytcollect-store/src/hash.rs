//! Blake3 hashing for checkpoint segment integrity

use std::io;
use std::path::Path;

/// Hash a file's contents with blake3.
pub fn hash_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update_mmap(path)?;
    Ok(hasher.finalize())
}

/// Hex digest of a file, as recorded in the manifest.
pub fn file_digest(path: &Path) -> io::Result<String> {
    Ok(hash_file(path)?.to_hex().to_string())
}

/// Return the first 8 hex characters of a recorded digest.
pub fn short_digest(digest: &str) -> &str {
    digest.get(..8).unwrap_or(digest)
}
