// src/pipeline/mod.rs

//! Stream pipeline: glob set → ordered steps → destination directory.

pub mod executor;
pub mod file;
pub mod glob;
pub mod steps;
pub mod writer;

pub use executor::{execute, PipelineReport, PipelineDef};
pub use file::AssetFile;
pub use glob::{FileMatcher, MatchedFile};
pub use steps::{build_step, Step, StepContext, StepMode};
pub use writer::{write_if_changed, WriteOutcome};
