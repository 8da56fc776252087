// src/errors.rs

//! Crate-wide error types.
//!
//! [`AssetflowError`] covers everything that can abort a run: configuration
//! problems (detected before any work starts) and task rejections. Per-file
//! transformation failures are a separate [`TransformError`]: they are logged
//! at the pipeline boundary and never abort a run.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    #[error("Cyclic dependency: {0}")]
    CyclicDependency(String),

    #[error("Task '{task}' failed: {reason}")]
    TaskRejection { task: String, reason: String },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssetflowError {
    /// True for errors detected while loading/validating the task graph.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AssetflowError::ConfigError(_)
                | AssetflowError::UnknownTask(_)
                | AssetflowError::DuplicateTask(_)
                | AssetflowError::CyclicDependency(_)
                | AssetflowError::TomlError(_)
        )
    }
}

/// A single transformation step failed on a single file (or, for barrier
/// steps, on the whole batch).
#[derive(Error, Debug, Clone)]
#[error("step '{step}' failed on {file:?}: {message}")]
pub struct TransformError {
    pub step: String,
    pub file: PathBuf,
    pub message: String,
}

impl TransformError {
    pub fn new(step: impl Into<String>, file: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self {
            step: step.into(),
            file: file.into(),
            message: message.to_string(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetflowError>;
