// src/pipeline/steps/mod.rs

//! Transformation steps.
//!
//! A [`Step`] is either per-file (applied to each file independently) or a
//! barrier (consumes every upstream file before producing output, e.g.
//! concatenation). Built-in steps are constructed from `use = "<name>"`
//! entries in the config by [`build_step`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::config::StepConfig;
use crate::fs::FileSystem;
use crate::pipeline::file::AssetFile;
use crate::pipeline::glob::FileMatcher;

pub mod concat;
pub mod html;
pub mod inject;
pub mod js;
pub mod order;
pub mod raster;
pub mod rename;
pub mod sass;
pub mod svg;

pub use concat::ConcatStep;
pub use html::{HtmlLintStep, HtmlMinifyStep, RemoveEmptyLinesStep};
pub use inject::InjectStep;
pub use js::JsMinifyStep;
pub use order::OrderStep;
pub use raster::{ImageOptimizeStep, WebpStep};
pub use rename::RenameStep;
pub use sass::{CssMinifyStep, SassStep};
pub use svg::SvgSpriteStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    PerFile,
    Barrier,
}

/// A single transformation in a pipeline.
///
/// Per-file steps implement [`Step::transform`]; barrier steps return
/// [`StepMode::Barrier`] from [`Step::mode`] and implement
/// [`Step::aggregate`].
///
/// The executor calls `aggregate` for every step: with a single file for
/// per-file steps and with the whole batch for barriers. A per-file step may
/// therefore override `aggregate` to drop a file (returning an empty vec).
pub trait Step: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn mode(&self) -> StepMode {
        StepMode::PerFile
    }

    fn transform(&self, file: AssetFile) -> Result<AssetFile> {
        Ok(file)
    }

    fn aggregate(&self, files: Vec<AssetFile>) -> Result<Vec<AssetFile>> {
        files.into_iter().map(|f| self.transform(f)).collect()
    }
}

/// What a step needs from its environment at construction time.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub fs: Arc<dyn FileSystem>,
    pub root: PathBuf,
}

/// Build a step from its config entry.
pub fn build_step(cfg: &StepConfig, ctx: &StepContext) -> Result<Arc<dyn Step>> {
    let step: Arc<dyn Step> = match cfg {
        StepConfig::Sass { style, load_paths } => Arc::new(SassStep::new(
            Arc::clone(&ctx.fs),
            *style,
            load_paths.iter().map(|p| ctx.root.join(p)).collect(),
        )),
        StepConfig::CssMinify => Arc::new(CssMinifyStep::new(Arc::clone(&ctx.fs))),
        StepConfig::Concat { file, separator } => {
            Arc::new(ConcatStep::new(file.clone(), separator.clone()))
        }
        StepConfig::Order { patterns } => Arc::new(OrderStep::new(patterns)?),
        StepConfig::Rename {
            file_name,
            extension,
            suffix,
        } => Arc::new(RenameStep {
            file_name: file_name.clone(),
            extension: extension.clone(),
            suffix: suffix.clone(),
        }),
        StepConfig::HtmlMinify { remove_comments } => Arc::new(HtmlMinifyStep {
            remove_comments: *remove_comments,
        }),
        StepConfig::RemoveEmptyLines => Arc::new(RemoveEmptyLinesStep),
        StepConfig::HtmlLint { rules } => Arc::new(HtmlLintStep::new(rules.as_deref())?),
        StepConfig::Inject {
            sources,
            ignore_path,
            add_root_slash,
        } => Arc::new(InjectStep::new(
            Arc::clone(&ctx.fs),
            ctx.root.clone(),
            FileMatcher::new(sources)?,
            ignore_path.clone(),
            *add_root_slash,
        )),
        StepConfig::SvgSprite { file, inline } => {
            Arc::new(SvgSpriteStep::new(file.clone(), *inline))
        }
        StepConfig::JsMinify => Arc::new(JsMinifyStep),
        StepConfig::ImageOptimize {
            png_level,
            jpeg_quality,
        } => Arc::new(ImageOptimizeStep {
            png_level: *png_level,
            jpeg_quality: *jpeg_quality,
        }),
        StepConfig::Webp => Arc::new(WebpStep),
    };
    Ok(step)
}
