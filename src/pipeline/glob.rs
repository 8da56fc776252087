// src/pipeline/glob.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

use crate::fs::FileSystem;

/// An ordered set of include/exclude glob patterns.
///
/// Patterns are relative to the project root; a leading `!` marks an
/// exclusion. A path is selected when the *last* pattern that matches it is
/// an include, so `["*.css", "!vendor.css"]` selects `a.css` but not
/// `vendor.css`, and a later include can bring an excluded path back.
///
/// `*` never crosses a `/`; use `**` for that.
#[derive(Clone)]
pub struct FileMatcher {
    rules: Vec<Rule>,
}

#[derive(Clone)]
struct Rule {
    pattern: String,
    negated: bool,
    matcher: GlobMatcher,
    /// Directory prefix before the first glob metacharacter.
    base: PathBuf,
}

/// A file selected by a [`FileMatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    /// Path as seen by the filesystem (`root` joined with `rel`).
    pub path: PathBuf,
    /// Path relative to the root, with forward slashes.
    pub rel: String,
    /// Base directory of the pattern that selected this file.
    pub base: PathBuf,
}

impl MatchedFile {
    /// Path relative to the selecting pattern's base, used for output naming.
    pub fn relative_to_base(&self) -> PathBuf {
        relative_to(Path::new(&self.rel), &self.base)
    }
}

impl fmt::Debug for FileMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| {
                if r.negated {
                    format!("!{}", r.pattern)
                } else {
                    r.pattern.clone()
                }
            }))
            .finish()
    }
}

impl FileMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut rules = Vec::with_capacity(patterns.len());
        for raw in patterns {
            let raw = raw.as_ref().trim();
            let (negated, pattern) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            let pattern = normalize_pattern(pattern);
            let matcher = GlobBuilder::new(&pattern)
                .literal_separator(true)
                .build()
                .with_context(|| format!("invalid glob pattern: {raw}"))?
                .compile_matcher();
            rules.push(Rule {
                base: glob_base(&pattern),
                pattern,
                negated,
                matcher,
            });
        }
        Ok(Self { rules })
    }

    /// Patterns as given (normalized), with `!` restored on exclusions.
    pub fn patterns(&self) -> Vec<String> {
        self.rules
            .iter()
            .map(|r| {
                if r.negated {
                    format!("!{}", r.pattern)
                } else {
                    r.pattern.clone()
                }
            })
            .collect()
    }

    /// Whether the path (relative to the root, forward slashes) is selected.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.selecting_rule(rel_path).is_some()
    }

    fn selecting_rule(&self, rel_path: &str) -> Option<&Rule> {
        let rel_path = rel_path.strip_prefix("./").unwrap_or(rel_path);
        let last = self.rules.iter().rev().find(|r| r.matcher.is_match(rel_path))?;
        if last.negated { None } else { Some(last) }
    }

    /// Resolve the patterns to a sorted snapshot of matching files.
    ///
    /// Only the base directories of include patterns are walked.
    pub fn resolve(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<MatchedFile>> {
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        let mut walked: BTreeSet<PathBuf> = BTreeSet::new();

        for rule in self.rules.iter().filter(|r| !r.negated) {
            if !walked.insert(rule.base.clone()) {
                continue;
            }
            let start = if rule.base.as_os_str().is_empty() {
                root.to_path_buf()
            } else {
                root.join(&rule.base)
            };
            if !fs.is_dir(&start) {
                continue;
            }
            collect_files(fs, root, &start, &mut candidates)?;
        }

        let files = candidates
            .into_iter()
            .filter_map(|rel| {
                let rule = self.selecting_rule(&rel)?;
                Some(MatchedFile {
                    path: root.join(&rel),
                    base: rule.base.clone(),
                    rel,
                })
            })
            .collect();

        Ok(files)
    }
}

fn collect_files(
    fs: &dyn FileSystem,
    root: &Path,
    start: &Path,
    out: &mut BTreeSet<String>,
) -> Result<()> {
    let mut stack = vec![start.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    out.insert(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
    }

    Ok(())
}

fn normalize_pattern(pattern: &str) -> String {
    let mut p = pattern.replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    p
}

fn has_glob_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

/// Directory prefix of a pattern before its first glob metacharacter.
///
/// `src/js/**/*.js` → `src/js`; a literal path such as
/// `src/scss/style.scss` → `src/scss`.
pub fn glob_base(pattern: &str) -> PathBuf {
    let pattern = normalize_pattern(pattern);
    let segments: Vec<&str> = pattern.split('/').collect();
    let literal: Vec<&str> = segments
        .iter()
        .take_while(|s| !has_glob_meta(s))
        .copied()
        .collect();

    let dir_segments = if literal.len() == segments.len() {
        &literal[..literal.len().saturating_sub(1)]
    } else {
        &literal[..]
    };

    dir_segments
        .iter()
        .filter(|s| !s.is_empty())
        .collect::<PathBuf>()
}

/// `path` relative to `base`; falls back to `path` itself when it does not
/// live under `base`.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
