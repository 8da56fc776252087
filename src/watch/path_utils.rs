// src/watch/path_utils.rs

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// A direct `strip_prefix(root)` is tried first; if that fails (symlinks,
/// `/private/var` vs `/var` on macOS) both paths are canonicalized and the
/// prefix is stripped again. A path that was just deleted cannot be
/// canonicalized, so its parent is canonicalized instead.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;

    path_canon.strip_prefix(&root_canon).ok().map(to_slash)
}

fn to_slash(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_prefix() {
        assert_eq!(
            relative_str(Path::new("/site"), Path::new("/site/src/a.css")).as_deref(),
            Some("src/a.css")
        );
        assert_eq!(relative_str(Path::new("/site"), Path::new("/other/a.css")), None);
    }
}
