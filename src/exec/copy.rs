// src/exec/copy.rs

//! Bounded-concurrency file copying used by the bundle targets.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::fs::FileSystem;
use crate::manifest::compute_file_hash;

/// Maximum number of copies in flight, to stay well below file descriptor limits.
pub const MAX_OPEN_FILES: usize = 64;

/// Whether to skip a copy when the destination already has identical contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    Always,
    IfChanged,
}

/// Copy each `(source, destination)` pair, at most [`MAX_OPEN_FILES`] at a time.
///
/// Returns the number of files actually written.
pub async fn copy_files(
    fs: Arc<dyn FileSystem>,
    pairs: Vec<(PathBuf, PathBuf)>,
    mode: CopyMode,
) -> Result<usize> {
    let semaphore = Arc::new(Semaphore::new(MAX_OPEN_FILES));
    let mut join_set = JoinSet::new();

    for (source, destination) in pairs {
        let permit = semaphore.clone().acquire_owned().await?;
        let fs = Arc::clone(&fs);
        join_set.spawn_blocking(move || {
            let _permit = permit;
            copy_one(fs.as_ref(), &source, &destination, mode)
        });
    }

    let mut copied = 0;
    while let Some(joined) = join_set.join_next().await {
        let wrote = joined.map_err(|e| anyhow!("copy task panicked: {e}"))??;
        if wrote {
            copied += 1;
        }
    }
    Ok(copied)
}

fn copy_one(
    fs: &dyn FileSystem,
    source: &Path,
    destination: &Path,
    mode: CopyMode,
) -> Result<bool> {
    if mode == CopyMode::IfChanged && is_identical(fs, source, destination)? {
        debug!(source = ?source, destination = ?destination, "unchanged; skipping copy");
        return Ok(false);
    }
    fs.copy(source, destination)
        .with_context(|| format!("copying {:?} to {:?}", source, destination))?;
    debug!(source = ?source, destination = ?destination, "copied file");
    Ok(true)
}

fn is_identical(fs: &dyn FileSystem, source: &Path, destination: &Path) -> Result<bool> {
    if !fs.is_file(destination) {
        return Ok(false);
    }
    if fs.metadata(source)?.len != fs.metadata(destination)?.len {
        return Ok(false);
    }
    Ok(compute_file_hash(fs, source)? == compute_file_hash(fs, destination)?)
}
