// src/pipeline/steps/concat.rs

use std::path::PathBuf;

use anyhow::Result;

use crate::pipeline::file::AssetFile;
use crate::pipeline::steps::{Step, StepMode};

/// Join every upstream file, in arrival order, into a single file.
///
/// No input means no output.
#[derive(Debug, Clone)]
pub struct ConcatStep {
    file: String,
    separator: String,
}

impl ConcatStep {
    pub fn new(file: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            separator: separator.into(),
        }
    }
}

impl Step for ConcatStep {
    fn name(&self) -> &str {
        "concat"
    }

    fn mode(&self) -> StepMode {
        StepMode::Barrier
    }

    fn aggregate(&self, files: Vec<AssetFile>) -> Result<Vec<AssetFile>> {
        let Some(first) = files.first() else {
            return Ok(Vec::new());
        };
        let source = first.source.clone();

        let mut contents = Vec::new();
        for (i, file) in files.iter().enumerate() {
            if i > 0 {
                contents.extend_from_slice(self.separator.as_bytes());
            }
            contents.extend_from_slice(&file.contents);
        }

        Ok(vec![AssetFile::new(PathBuf::from(&self.file), contents).with_source(source)])
    }
}
