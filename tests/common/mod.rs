#![allow(dead_code)]

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use assetflow::fs::mock::MockFileSystem;
use assetflow::fs::FileSystem;
use assetflow::registry::TaskContext;

pub use assetflow_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Root used for in-memory projects.
pub const ROOT: &str = "site";

/// An in-memory project seeded with `(path, contents)` pairs under [`ROOT`].
pub fn mock_project(files: &[(&str, &str)]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    for (path, contents) in files {
        fs.add_file(Path::new(ROOT).join(path), *contents);
    }
    fs
}

pub fn mock_context(fs: &MockFileSystem) -> TaskContext {
    let fs: Arc<dyn FileSystem> = Arc::new(fs.clone());
    TaskContext::new(ROOT, fs)
}

/// Write `(path, contents)` pairs below `dir`, creating parents.
pub fn write_tree(dir: &Path, files: &[(&str, &str)]) -> std::io::Result<()> {
    for (path, contents) in files {
        let path = dir.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
    }
    Ok(())
}
