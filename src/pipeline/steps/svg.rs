// src/pipeline/steps/svg.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;

use crate::pipeline::file::AssetFile;
use crate::pipeline::steps::{Step, StepMode};

static SVG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<svg\b(?P<attrs>[^>]*)>(?P<body>.*)</svg\s*>").expect("valid regex")
});
static VIEWBOX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\sviewBox\s*=\s*["']([^"']*)["']"#).expect("valid regex")
});
static DIMENSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s(width|height)\s*=\s*["']([0-9.]+)(?:px)?["']"#).expect("valid regex")
});

const XML_PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Combine every SVG in the batch into one sprite of `<symbol>` elements.
///
/// Each symbol's id is the source file stem. With `inline` the output has no
/// XML prolog, so it can be pasted into an HTML document.
#[derive(Debug, Clone)]
pub struct SvgSpriteStep {
    file: String,
    inline: bool,
}

impl SvgSpriteStep {
    pub fn new(file: impl Into<String>, inline: bool) -> Self {
        Self {
            file: file.into(),
            inline,
        }
    }
}

fn view_box(attrs: &str) -> Option<String> {
    if let Some(caps) = VIEWBOX_RE.captures(attrs) {
        return Some(caps[1].to_string());
    }
    let mut width = None;
    let mut height = None;
    for caps in DIMENSION_RE.captures_iter(attrs) {
        match caps[1].to_ascii_lowercase().as_str() {
            "width" => width = Some(caps[2].to_string()),
            _ => height = Some(caps[2].to_string()),
        }
    }
    Some(format!("0 0 {} {}", width?, height?))
}

fn symbol_for(file: &AssetFile) -> Result<(String, String)> {
    let id = file
        .file_stem()
        .with_context(|| format!("{:?} has no file name", file.source))?
        .to_string();
    let text = file.text()?;
    let caps = SVG_RE
        .captures(text)
        .with_context(|| format!("{:?} contains no <svg> element", file.source))?;

    let mut symbol = format!("<symbol id=\"{id}\"");
    if let Some(vb) = view_box(&caps["attrs"]) {
        symbol.push_str(&format!(" viewBox=\"{vb}\""));
    }
    symbol.push('>');
    symbol.push_str(caps["body"].trim());
    symbol.push_str("</symbol>");
    Ok((id, symbol))
}

impl Step for SvgSpriteStep {
    fn name(&self) -> &str {
        "svg_sprite"
    }

    fn mode(&self) -> StepMode {
        StepMode::Barrier
    }

    fn aggregate(&self, files: Vec<AssetFile>) -> Result<Vec<AssetFile>> {
        let Some(first) = files.first() else {
            return Ok(Vec::new());
        };
        let source = first.source.clone();

        let mut ids = HashSet::new();
        let mut out = String::new();
        if !self.inline {
            out.push_str(XML_PROLOG);
        }
        out.push_str(&format!("<svg xmlns=\"{SVG_NS}\" style=\"display:none\">\n"));
        for file in &files {
            let (id, symbol) = symbol_for(file)?;
            if !ids.insert(id.clone()) {
                bail!("duplicate symbol id {id:?} from {:?}", file.source);
            }
            out.push_str(&symbol);
            out.push('\n');
        }
        out.push_str("</svg>\n");

        Ok(vec![AssetFile::new(PathBuf::from(&self.file), out).with_source(source)])
    }
}
