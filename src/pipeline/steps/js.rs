// src/pipeline/steps/js.rs

use anyhow::{anyhow, Result};

use crate::pipeline::file::AssetFile;
use crate::pipeline::steps::Step;

/// Minify JavaScript with `minify-js` (whitespace removal and local
/// identifier mangling).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsMinifyStep;

impl Step for JsMinifyStep {
    fn name(&self) -> &str {
        "js_minify"
    }

    fn transform(&self, mut file: AssetFile) -> Result<AssetFile> {
        let session = minify_js::Session::new();
        let mut out = Vec::new();
        minify_js::minify(&session, minify_js::TopLevelMode::Global, &file.contents, &mut out)
            .map_err(|e| anyhow!("cannot minify {:?}: {e:?}", file.source))?;
        file.contents = out;
        Ok(file)
    }
}
