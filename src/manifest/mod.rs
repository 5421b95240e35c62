// src/manifest/mod.rs

//! Persisted content-fingerprint table and per-target build stamps.
//!
//! The manifest loaded at the start of a build is the *previous* snapshot and
//! is never mutated. Fingerprints computed during the build accumulate in a
//! separate in-memory table; staleness always compares against the previous
//! snapshot. [`HashManifest::persist`] merges both and atomically replaces the
//! file on disk (temp file + rename). The executor only persists after a fully
//! successful build, so a failed or interrupted build leaves the previous
//! manifest in place.

pub mod cache;
pub mod hash;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fs::FileSystem;

pub use cache::FileCache;
pub use hash::{compute_file_hash, fingerprint_file, FileFingerprint};

/// File name of the manifest inside the build directory.
pub const MANIFEST_FILE: &str = ".assemble_manifest.json";

/// Bumped whenever the on-disk layout changes; older manifests are discarded.
pub const MANIFEST_VERSION: u32 = 1;

/// Resolved input and output sets of a target's last successful execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStamp {
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestData {
    version: u32,
    #[serde(default)]
    files: BTreeMap<PathBuf, FileFingerprint>,
    #[serde(default)]
    targets: BTreeMap<String, BuildStamp>,
}

impl Default for ManifestData {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            files: BTreeMap::new(),
            targets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct CurrentState {
    files: FileCache,
    stamps: BTreeMap<String, BuildStamp>,
}

#[derive(Debug)]
pub struct HashManifest {
    path: PathBuf,
    previous: ManifestData,
    current: Mutex<CurrentState>,
}

impl HashManifest {
    /// Location of the manifest for a given build directory.
    pub fn manifest_path(build_dir: &Path) -> PathBuf {
        build_dir.join(MANIFEST_FILE)
    }

    /// An empty manifest that will be written to `<build_dir>/.assemble_manifest.json`.
    pub fn empty(build_dir: &Path) -> Self {
        Self {
            path: Self::manifest_path(build_dir),
            previous: ManifestData::default(),
            current: Mutex::new(CurrentState::default()),
        }
    }

    /// Load the manifest from `build_dir`.
    ///
    /// Never fails: a missing, unreadable, corrupt, or outdated manifest is
    /// treated as empty, which makes every target stale.
    pub fn load(fs: &dyn FileSystem, build_dir: &Path) -> Self {
        let mut manifest = Self::empty(build_dir);
        let path = manifest.path.clone();

        if !fs.exists(&path) {
            debug!(path = ?path, "no hash manifest found; treating as first build");
            return manifest;
        }

        let contents = match fs.read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = ?path, error = %err, "failed to read hash manifest; ignoring");
                return manifest;
            }
        };

        match serde_json::from_str::<ManifestData>(&contents) {
            Ok(data) if data.version == MANIFEST_VERSION => {
                debug!(
                    path = ?path,
                    files = data.files.len(),
                    targets = data.targets.len(),
                    "loaded hash manifest"
                );
                manifest.previous = data;
            }
            Ok(data) => {
                warn!(
                    path = ?path,
                    found = data.version,
                    expected = MANIFEST_VERSION,
                    "hash manifest version mismatch; ignoring"
                );
            }
            Err(err) => {
                warn!(path = ?path, error = %err, "corrupt hash manifest; ignoring");
            }
        }

        manifest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, CurrentState> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fingerprint recorded for `path` by the last successful build.
    pub fn previous_fingerprint(&self, path: &Path) -> Option<&FileFingerprint> {
        self.previous.files.get(path)
    }

    /// Stamp recorded for `target` by the last successful build.
    pub fn previous_stamp(&self, target: &str) -> Option<&BuildStamp> {
        self.previous.targets.get(target)
    }

    /// Number of file entries in the previous snapshot.
    pub fn previous_len(&self) -> usize {
        self.previous.files.len()
    }

    /// Current fingerprint of `path`.
    ///
    /// The file is hashed at most once per build: later calls reuse the hash
    /// as long as size and mtime are unchanged. The previous snapshot's hash
    /// is never trusted on metadata alone, so a content edit followed by an
    /// mtime reset is still detected.
    pub fn fingerprint(&self, fs: &dyn FileSystem, path: &Path) -> Result<FileFingerprint> {
        let meta = fs.metadata(path)?;

        if let Some(fp) = self.lock().files.get(path, &meta) {
            return Ok(fp.clone());
        }

        let fingerprint = fingerprint_file(fs, path)?;
        self.lock().files.insert(path, fingerprint.clone());
        Ok(fingerprint)
    }

    /// Re-hash `path` unconditionally, e.g. after a target rewrote it.
    pub fn refresh(&self, fs: &dyn FileSystem, path: &Path) -> Result<FileFingerprint> {
        self.lock().files.invalidate(path);
        let fingerprint = fingerprint_file(fs, path)?;
        self.lock().files.insert(path, fingerprint.clone());
        Ok(fingerprint)
    }

    /// Record the stamp of a target that just executed successfully.
    pub fn record_stamp(&self, target: &str, stamp: BuildStamp) {
        self.lock().stamps.insert(target.to_string(), stamp);
    }

    /// Atomically write the merged manifest to disk.
    ///
    /// Entries for files that no longer exist are pruned.
    pub fn persist(&self, fs: &dyn FileSystem) -> Result<()> {
        let mut data = ManifestData {
            version: MANIFEST_VERSION,
            files: self.previous.files.clone(),
            targets: self.previous.targets.clone(),
        };

        {
            let state = self.lock();
            for (path, fp) in state.files.iter() {
                data.files.insert(path.clone(), fp.clone());
            }
            for (name, stamp) in state.stamps.iter() {
                data.targets.insert(name.clone(), stamp.clone());
            }
        }

        let before = data.files.len();
        data.files.retain(|path, _| fs.is_file(path));
        let pruned = before - data.files.len();

        let json = serde_json::to_string_pretty(&data).context("failed to serialize hash manifest")?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs.write(&tmp_path, json.as_bytes())
            .context("failed to write temporary hash manifest")?;
        fs.rename(&tmp_path, &self.path)
            .context("failed to atomically replace hash manifest")?;

        info!(
            path = ?self.path,
            files = data.files.len(),
            targets = data.targets.len(),
            pruned,
            "persisted hash manifest"
        );
        Ok(())
    }
}
