// src/fs/mock.rs

use super::{FileMetadata, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { contents: Vec<u8>, modified: u64 },
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Logical clock used as the modification time of written files.
    clock: u64,
    /// Number of times each path has been written or copied to.
    writes: HashMap<PathBuf, usize>,
}

/// In-memory filesystem for tests.
///
/// Every write advances a logical clock, so modification times are unique
/// and strictly increasing. Writes are counted per path.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut state = MockState::default();
        // Ensure root exists
        state
            .entries
            .insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a file without counting it as a write.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        insert_file(&mut state, path.as_ref(), content.into());
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        ensure_dir_entry(&mut state.entries, path.as_ref());
    }

    /// Remove a file or an empty directory.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        remove_entry(&mut state, path.as_ref());
    }

    /// Overwrite the modification time of a file, e.g. to simulate a fresh
    /// checkout that reset timestamps.
    pub fn set_modified(&self, path: impl AsRef<Path>, modified: u64) {
        let mut state = self.lock();
        if let Some(MockEntry::File { modified: m, .. }) = state.entries.get_mut(path.as_ref()) {
            *m = modified;
        }
    }

    /// Contents of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let state = self.lock();
        match state.entries.get(path.as_ref()) {
            Some(MockEntry::File { contents, .. }) => Some(contents.clone()),
            _ => None,
        }
    }

    /// How many times `path` was written through the [`FileSystem`] API.
    pub fn write_count(&self, path: impl AsRef<Path>) -> usize {
        let state = self.lock();
        state.writes.get(path.as_ref()).copied().unwrap_or(0)
    }

    /// Reset all write counters.
    pub fn reset_write_counts(&self) {
        let mut state = self.lock();
        state.writes.clear();
    }
}

fn parent_of(path: &Path) -> Option<&Path> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() {
        Some(Path::new("."))
    } else {
        Some(parent)
    }
}

fn child_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(|s| s.to_string())
}

fn insert_file(state: &mut MockState, path: &Path, contents: Vec<u8>) {
    state.clock += 1;
    let modified = state.clock;
    state
        .entries
        .insert(path.to_path_buf(), MockEntry::File { contents, modified });

    // Ensure parent directories exist implicitly for simplicity in this mock
    if let Some(parent) = parent_of(path) {
        ensure_dir_entry(&mut state.entries, parent);
        // Add this file to parent's children
        if let (Some(MockEntry::Dir(children)), Some(name)) =
            (state.entries.get_mut(parent), child_name(path))
        {
            if !children.contains(&name) {
                children.push(name);
            }
        }
    }
}

fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if files.contains_key(path) {
        return;
    }
    files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    if let Some(parent) = parent_of(path) {
        if parent != path {
            // Avoid infinite loop at root
            ensure_dir_entry(files, parent);
            if let (Some(MockEntry::Dir(children)), Some(name)) =
                (files.get_mut(parent), child_name(path))
            {
                if !children.contains(&name) {
                    children.push(name);
                }
            }
        }
    }
}

fn remove_entry(state: &mut MockState, path: &Path) -> Option<MockEntry> {
    let removed = state.entries.remove(path)?;
    if let (Some(parent), Some(name)) = (parent_of(path), child_name(path)) {
        if let Some(MockEntry::Dir(children)) = state.entries.get_mut(parent) {
            children.retain(|c| c != &name);
        }
    }
    Some(removed)
}

fn count_write(state: &mut MockState, path: &Path) {
    *state.writes.entry(path.to_path_buf()).or_insert(0) += 1;
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { contents, .. }) => Ok(contents.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let bytes = self.read(path)?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if let Some(MockEntry::Dir(_)) = state.entries.get(path) {
            return Err(anyhow!("Is a directory: {:?}", path));
        }
        insert_file(&mut state, path, contents.to_vec());
        count_write(&mut state, path);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        let contents = self.read(from)?;
        self.write(to, &contents)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.lock();
        match remove_entry(&mut state, from) {
            Some(MockEntry::File { contents, modified }) => {
                insert_file(&mut state, to, contents);
                if let Some(MockEntry::File { modified: m, .. }) = state.entries.get_mut(to) {
                    *m = modified;
                }
                Ok(())
            }
            Some(entry @ MockEntry::Dir(_)) => {
                state.entries.insert(from.to_path_buf(), entry);
                Err(anyhow!("Cannot rename directory in mock: {:?}", from))
            }
            None => Err(anyhow!("File not found: {:?}", from)),
        }
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { .. }) => {
                remove_entry(&mut state, path);
                Ok(())
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        if let Some(MockEntry::File { .. }) = state.entries.get(path) {
            return Err(anyhow!("Is a file: {:?}", path));
        }
        ensure_dir_entry(&mut state.entries, path);
        Ok(())
    }

    fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { contents, modified }) => Ok(FileMetadata {
                len: contents.len() as u64,
                modified: *modified,
            }),
            Some(MockEntry::Dir(_)) => Ok(FileMetadata {
                len: 0,
                modified: 0,
            }),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.lock();
        state.entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        let state = self.lock();
        matches!(state.entries.get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let state = self.lock();
        matches!(state.entries.get(path), Some(MockEntry::Dir(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
