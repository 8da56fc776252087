// src/pipeline/executor.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::errors::TransformError;
use crate::fs::FileSystem;
use crate::pipeline::file::AssetFile;
use crate::pipeline::glob::{relative_to, FileMatcher};
use crate::pipeline::steps::{Step, StepMode};
use crate::pipeline::writer::{write_if_changed, WriteOutcome};

/// Everything needed to run one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineDef {
    pub sources: FileMatcher,
    pub steps: Vec<Arc<dyn Step>>,
    /// Destination directory, relative to the root.
    pub dest: PathBuf,
    /// Overrides the per-pattern glob base used to compute output paths.
    pub base: Option<PathBuf>,
}

/// Outcome of a pipeline run.
///
/// `written` and `unchanged` hold root-joined destination paths.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub matched: usize,
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub errors: Vec<TransformError>,
}

impl PipelineReport {
    /// Every output path, written or not.
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.written.iter().chain(self.unchanged.iter())
    }

    fn record(&mut self, err: TransformError) {
        error!(step = %err.step, file = ?err.file, "{}", err.message);
        self.errors.push(err);
    }
}

/// Run a pipeline: resolve sources, apply steps in order, write outputs.
///
/// Only a failure to resolve the sources is returned as an error. A read
/// failure or a per-file step failure drops that file; a barrier failure
/// drops the whole batch. Each is recorded once in the report.
pub fn execute(fs: &dyn FileSystem, root: &Path, def: &PipelineDef) -> Result<PipelineReport> {
    let matched = def.sources.resolve(fs, root)?;
    let mut report = PipelineReport {
        matched: matched.len(),
        ..Default::default()
    };
    debug!(sources = ?def.sources, matched = report.matched, "resolved pipeline sources");

    let mut batch = Vec::with_capacity(matched.len());
    for m in matched {
        let relative = match &def.base {
            Some(base) => relative_to(Path::new(&m.rel), base),
            None => m.relative_to_base(),
        };
        match fs.read(&m.path) {
            Ok(contents) => batch.push(AssetFile::new(relative, contents).with_source(m.path)),
            Err(e) => report.record(TransformError::new("read", m.path, format!("{e:#}"))),
        }
    }

    for step in &def.steps {
        batch = match step.mode() {
            StepMode::PerFile => {
                let mut out = Vec::with_capacity(batch.len());
                for file in batch {
                    let source = file.source.clone();
                    match step.aggregate(vec![file]) {
                        Ok(files) => out.extend(files),
                        Err(e) => report.record(TransformError::new(
                            step.name(),
                            source,
                            format!("{e:#}"),
                        )),
                    }
                }
                out
            }
            StepMode::Barrier => {
                let first = batch.first().map(|f| f.source.clone()).unwrap_or_default();
                match step.aggregate(batch) {
                    Ok(files) => files,
                    Err(e) => {
                        report.record(TransformError::new(step.name(), first, format!("{e:#}")));
                        Vec::new()
                    }
                }
            }
        };
    }

    let dest = root.join(&def.dest);
    for file in batch {
        let target = dest.join(&file.relative);
        match write_if_changed(fs, &target, &file.contents) {
            Ok(WriteOutcome::Written) => report.written.push(target),
            Ok(WriteOutcome::Unchanged) => report.unchanged.push(target),
            Err(e) => report.record(TransformError::new("write", file.source, format!("{e:#}"))),
        }
    }

    info!(
        dest = ?def.dest,
        matched = report.matched,
        written = report.written.len(),
        unchanged = report.unchanged.len(),
        errors = report.errors.len(),
        "pipeline finished"
    );

    Ok(report)
}
