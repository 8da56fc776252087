// src/pipeline/steps/rename.rs

use anyhow::{bail, Result};

use crate::pipeline::file::AssetFile;
use crate::pipeline::steps::Step;

/// Change the output file name.
///
/// Applied in this order: `file_name` replaces the whole name, then `suffix`
/// is appended to the stem (`main` + `.min` → `main.min.js`), then
/// `extension` replaces the extension.
#[derive(Debug, Clone, Default)]
pub struct RenameStep {
    pub file_name: Option<String>,
    pub extension: Option<String>,
    pub suffix: Option<String>,
}

impl Step for RenameStep {
    fn name(&self) -> &str {
        "rename"
    }

    fn transform(&self, mut file: AssetFile) -> Result<AssetFile> {
        if let Some(name) = &self.file_name {
            if name.is_empty() || name.contains('/') {
                bail!("invalid file_name {name:?}");
            }
            file.set_file_name(name);
        }

        if let Some(suffix) = &self.suffix {
            let stem = file.file_stem().unwrap_or_default().to_string();
            let new_name = match file.extension() {
                Some(ext) => format!("{stem}{suffix}.{ext}"),
                None => format!("{stem}{suffix}"),
            };
            file.set_file_name(&new_name);
        }

        if let Some(ext) = &self.extension {
            file.set_extension(ext.trim_start_matches('.'));
        }

        Ok(file)
    }
}
