// src/pipeline/writer.rs

use std::path::Path;

use anyhow::Result;
use tracing::trace;

use crate::fs::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Write `contents` to `path` unless the file already holds the same bytes.
///
/// Comparison is by blake3 digest of the existing file.
pub fn write_if_changed(fs: &dyn FileSystem, path: &Path, contents: &[u8]) -> Result<WriteOutcome> {
    if fs.is_file(path) {
        if let Ok(existing) = fs.read(path) {
            if blake3::hash(&existing) == blake3::hash(contents) {
                trace!(?path, "output unchanged, skipping write");
                return Ok(WriteOutcome::Unchanged);
            }
        }
    }

    fs.write(path, contents)?;
    Ok(WriteOutcome::Written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn identical_contents_are_not_rewritten() -> Result<()> {
        let fs = MockFileSystem::new();
        let path = Path::new("dist/a.css");

        assert_eq!(write_if_changed(&fs, path, b"a{}")?, WriteOutcome::Written);
        assert_eq!(write_if_changed(&fs, path, b"a{}")?, WriteOutcome::Unchanged);
        assert_eq!(write_if_changed(&fs, path, b"b{}")?, WriteOutcome::Written);
        assert_eq!(fs.write_count(), 2);
        Ok(())
    }
}
