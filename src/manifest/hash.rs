// src/manifest/hash.rs

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fs::{FileMetadata, FileSystem};

/// Content fingerprint of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// blake3 digest of the file contents, hex encoded.
    pub hash: String,
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch.
    pub mtime: u64,
}

impl FileFingerprint {
    /// Whether size and mtime still match `meta`, in which case the stored
    /// hash can be trusted without re-reading the file.
    pub fn matches_metadata(&self, meta: &FileMetadata) -> bool {
        self.size == meta.len && self.mtime == meta.modified
    }
}

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash `path` and capture its current size and mtime.
pub fn fingerprint_file(fs: &dyn FileSystem, path: &Path) -> Result<FileFingerprint> {
    let meta = fs.metadata(path)?;
    let hash = compute_file_hash(fs, path)?;
    debug!(path = ?path, hash = %hash, "hashed file");
    Ok(FileFingerprint {
        hash,
        size: meta.len,
        mtime: meta.modified,
    })
}
