use anyhow::{bail, Result};
use assetflow::pipeline::{AssetFile, Step};

/// Upper-cases text files.
#[derive(Debug)]
pub struct UppercaseStep;

impl Step for UppercaseStep {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn transform(&self, mut file: AssetFile) -> Result<AssetFile> {
        let text = file.text()?.to_uppercase();
        file.set_text(text);
        Ok(file)
    }
}

/// Fails on any file whose name contains `needle`.
#[derive(Debug)]
pub struct FailingStep {
    pub needle: String,
}

impl Step for FailingStep {
    fn name(&self) -> &str {
        "failing"
    }

    fn transform(&self, file: AssetFile) -> Result<AssetFile> {
        if file.relative.to_string_lossy().contains(&self.needle) {
            bail!("refusing {:?}", file.relative);
        }
        Ok(file)
    }
}
