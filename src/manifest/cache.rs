// src/manifest/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::fs::FileMetadata;
use crate::manifest::hash::FileFingerprint;

/// In-memory cache of file fingerprints computed during one build.
///
/// This avoids re-reading and re-hashing a file that appears as an input or
/// output of several targets. Entries are only served while the file's size
/// and mtime are unchanged.
#[derive(Debug, Default)]
pub struct FileCache {
    fingerprints: HashMap<PathBuf, FileFingerprint>,
}

impl FileCache {
    pub fn new() -> Self {
        Self {
            fingerprints: HashMap::new(),
        }
    }

    /// Cached fingerprint for `path`, if its metadata still matches.
    pub fn get(&self, path: &Path, meta: &FileMetadata) -> Option<&FileFingerprint> {
        self.fingerprints
            .get(path)
            .filter(|fp| fp.matches_metadata(meta))
    }

    pub fn insert(&mut self, path: &Path, fingerprint: FileFingerprint) {
        self.fingerprints.insert(path.to_path_buf(), fingerprint);
    }

    /// Invalidate the cached fingerprint for a file (e.g. after a target rewrote it).
    pub fn invalidate(&mut self, path: &Path) {
        if self.fingerprints.remove(path).is_some() {
            debug!("invalidated cache for {:?}", path);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileFingerprint)> {
        self.fingerprints.iter()
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}
