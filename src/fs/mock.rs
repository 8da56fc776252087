// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory filesystem.
///
/// Directories are implicit: a directory exists when some file lives below
/// it, when it was created by removing its contents, or when it is the root
/// (`.`). Paths are normalized so `./src/a.css` and `src/a.css` are the same
/// entry.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    writes: usize,
}

fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only happens after a test already panicked.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        self.state().files.insert(path, content.into());
    }

    /// Register an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        self.state().dirs.insert(path);
    }

    /// Contents of a file as UTF-8, if it exists.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let path = normalize(path.as_ref());
        self.state()
            .files
            .get(&path)
            .map(|c| String::from_utf8_lossy(c).into_owned())
    }

    /// All file paths, sorted.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.state().files.keys().cloned().collect()
    }

    /// Number of `write` calls made so far.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }
}

impl MockState {
    fn is_dir(&self, path: &Path) -> bool {
        if path == Path::new(".") || self.dirs.contains(path) {
            return true;
        }
        self.files.keys().any(|f| f != path && f.starts_with(path))
            || self.dirs.iter().any(|d| d != path && d.starts_with(path))
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = normalize(path);
        let state = self.state();
        match state.files.get(&path) {
            Some(content) => Ok(content.clone()),
            None if state.is_dir(&path) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let path = normalize(path);
        let mut state = self.state();
        state.writes += 1;
        state.files.insert(path, contents.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let path = normalize(path);
        let state = self.state();
        state.files.contains_key(&path) || state.is_dir(&path)
    }

    fn is_file(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.state().files.contains_key(&path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.state().is_dir(&path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let dir = normalize(path);
        let state = self.state();
        if !state.is_dir(&dir) {
            return Err(anyhow!("Not a directory or not found: {:?}", path));
        }

        let prefix_len = if dir == Path::new(".") {
            0
        } else {
            dir.components().count()
        };

        let mut children = BTreeSet::new();
        for entry in state.files.keys().chain(state.dirs.iter()) {
            let below = dir == Path::new(".") || (entry != &dir && entry.starts_with(&dir));
            if !below {
                continue;
            }
            if let Some(child) = entry.components().nth(prefix_len) {
                children.insert(child.as_os_str().to_os_string());
            }
        }

        Ok(children.into_iter().map(|name| path.join(name)).collect())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        self.state()
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut state = self.state();
        if !state.is_dir(&path) {
            return Err(anyhow!("Not a directory or not found: {:?}", path));
        }
        state.files.retain(|f, _| !f.starts_with(&path));
        state.dirs.retain(|d| !d.starts_with(&path));
        Ok(())
    }
}
