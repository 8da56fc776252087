// src/pipeline/steps/order.rs

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

use crate::pipeline::file::AssetFile;
use crate::pipeline::steps::{Step, StepMode};

/// Reorder the batch by priority patterns.
///
/// Files are sorted by the index of the first pattern matching their output
/// path; files matching nothing go last. The sort is stable, so files with
/// the same priority keep their (alphabetical) resolution order.
#[derive(Debug, Clone)]
pub struct OrderStep {
    patterns: Vec<GlobMatcher>,
}

impl OrderStep {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                GlobBuilder::new(p.strip_prefix("./").unwrap_or(p))
                    .literal_separator(true)
                    .build()
                    .map(|g| g.compile_matcher())
                    .with_context(|| format!("invalid order pattern: {p}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    fn priority(&self, file: &AssetFile) -> usize {
        let rel = file.relative.to_string_lossy().replace('\\', "/");
        self.patterns
            .iter()
            .position(|m| m.is_match(&rel))
            .unwrap_or(self.patterns.len())
    }
}

impl Step for OrderStep {
    fn name(&self) -> &str {
        "order"
    }

    fn mode(&self) -> StepMode {
        StepMode::Barrier
    }

    fn aggregate(&self, mut files: Vec<AssetFile>) -> Result<Vec<AssetFile>> {
        files.sort_by_key(|f| self.priority(f));
        Ok(files)
    }
}
