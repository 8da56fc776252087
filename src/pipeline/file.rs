// src/pipeline/file.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// An in-memory file flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// Output path, relative to the pipeline's destination directory.
    pub relative: PathBuf,
    pub contents: Vec<u8>,
    /// Where the file was read from (root-joined), used for error reports
    /// and for resolving imports next to the source.
    pub source: PathBuf,
}

impl AssetFile {
    pub fn new(relative: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        let relative = relative.into();
        Self {
            source: relative.clone(),
            relative,
            contents: contents.into(),
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.contents)
            .with_context(|| format!("{:?} is not valid UTF-8", self.source))
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.contents = text.into().into_bytes();
    }

    pub fn extension(&self) -> Option<&str> {
        self.relative.extension().and_then(|e| e.to_str())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.relative.file_name().and_then(|n| n.to_str())
    }

    pub fn file_stem(&self) -> Option<&str> {
        self.relative.file_stem().and_then(|n| n.to_str())
    }

    pub fn set_extension(&mut self, ext: &str) {
        self.relative.set_extension(ext);
    }

    /// Replace the file name, keeping the directory part.
    pub fn set_file_name(&mut self, name: &str) {
        self.relative.set_file_name(name);
    }

    /// Directory of the source file, for import resolution.
    pub fn source_dir(&self) -> &Path {
        self.source.parent().unwrap_or_else(|| Path::new("."))
    }
}
