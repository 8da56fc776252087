// src/pipeline/steps/sass.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{anyhow, Context, Result};
use globset::GlobBuilder;
use regex::{Captures, Regex};
use tracing::warn;

use crate::fs::FileSystem;
use crate::pipeline::file::AssetFile;
use crate::pipeline::glob::glob_base;
use crate::pipeline::steps::Step;
use crate::types::CssStyle;

/// `@import "<pattern>";` where the pattern holds a glob metacharacter.
static GLOB_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+["']([^"']*[*?\[{][^"']*)["']\s*;"#).expect("valid regex")
});

const SASS_EXTENSIONS: [&str; 3] = ["scss", "sass", "css"];

/// Lets `grass` resolve `@import`/`@use` through our [`FileSystem`].
struct GrassFs<'a>(&'a dyn FileSystem);

impl fmt::Debug for GrassFs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GrassFs").finish()
    }
}

impl grass::Fs for GrassFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        self.0.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.0.is_file(path)
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.0
            .read(path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))
    }
}

fn compile(
    fs: &dyn FileSystem,
    file: &AssetFile,
    style: CssStyle,
    load_paths: &[PathBuf],
) -> Result<String> {
    let source_dir = file.source_dir().to_path_buf();
    let source = expand_glob_imports(fs, &file.source, file.text()?)?;
    let grass_fs = GrassFs(fs);

    let output_style = match style {
        CssStyle::Expanded => grass::OutputStyle::Expanded,
        CssStyle::Compressed => grass::OutputStyle::Compressed,
    };

    let mut options = grass::Options::default()
        .fs(&grass_fs)
        .style(output_style)
        .load_path(&source_dir);
    for path in load_paths {
        options = options.load_path(path);
    }

    grass::from_string(source, &options).map_err(|e| anyhow!("{e}"))
}

/// Replace each glob import with one `@import` per matching stylesheet,
/// in path order. Patterns resolve against the importing file's directory
/// and may omit the extension (`@import "components/*";`). The importing
/// file never imports itself.
pub fn expand_glob_imports(fs: &dyn FileSystem, importer: &Path, source: &str) -> Result<String> {
    let mut failure = None;
    let expanded = GLOB_IMPORT_RE.replace_all(source, |caps: &Captures| {
        match glob_imports(fs, importer, &caps[1]) {
            Ok(imports) => imports,
            Err(err) => {
                failure.get_or_insert(err);
                String::new()
            }
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(expanded.into_owned()),
    }
}

fn glob_imports(fs: &dyn FileSystem, importer: &Path, pattern: &str) -> Result<String> {
    let source_dir = importer.parent().unwrap_or_else(|| Path::new(""));
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid sass glob import: {pattern}"))?
        .compile_matcher();

    let mut found: BTreeSet<String> = BTreeSet::new();
    let base = glob_base(pattern);
    let start = if base.as_os_str().is_empty() {
        source_dir.to_path_buf()
    } else {
        source_dir.join(base)
    };
    let mut stack = vec![start];
    while let Some(dir) = stack.pop() {
        if !fs.is_dir(&dir) {
            continue;
        }
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
                continue;
            }
            if path == importer {
                continue;
            }
            let is_stylesheet = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SASS_EXTENSIONS.contains(&e));
            let Ok(rel) = path.strip_prefix(source_dir) else {
                continue;
            };
            if !is_stylesheet {
                continue;
            }
            let rel = rel.to_string_lossy().replace('\\', "/");
            let stem = rel.rsplit_once('.').map_or(rel.as_str(), |(stem, _)| stem);
            if matcher.is_match(&rel) || matcher.is_match(stem) {
                found.insert(stem.to_string());
            }
        }
    }

    if found.is_empty() {
        warn!(pattern, dir = ?source_dir, "sass glob import matched no files");
    }
    Ok(found
        .iter()
        .map(|stem| format!("@import \"{stem}\";\n"))
        .collect())
}

/// Compile SCSS to CSS; the output gets a `.css` extension.
///
/// Partials (`_name.scss`) are only meant to be imported and produce no
/// output of their own.
pub struct SassStep {
    fs: Arc<dyn FileSystem>,
    style: CssStyle,
    load_paths: Vec<PathBuf>,
}

impl fmt::Debug for SassStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SassStep")
            .field("style", &self.style)
            .field("load_paths", &self.load_paths)
            .finish_non_exhaustive()
    }
}

impl SassStep {
    pub fn new(fs: Arc<dyn FileSystem>, style: CssStyle, load_paths: Vec<PathBuf>) -> Self {
        Self {
            fs,
            style,
            load_paths,
        }
    }
}

impl Step for SassStep {
    fn name(&self) -> &str {
        "sass"
    }

    fn aggregate(&self, files: Vec<AssetFile>) -> Result<Vec<AssetFile>> {
        files
            .into_iter()
            .filter(|f| !f.file_name().is_some_and(|n| n.starts_with('_')))
            .map(|f| self.transform(f))
            .collect()
    }

    fn transform(&self, mut file: AssetFile) -> Result<AssetFile> {
        let css = compile(self.fs.as_ref(), &file, self.style, &self.load_paths)?;
        file.set_text(css);
        file.set_extension("css");
        Ok(file)
    }
}

/// Minify CSS by running it through the compiler in compressed mode.
pub struct CssMinifyStep {
    fs: Arc<dyn FileSystem>,
}

impl fmt::Debug for CssMinifyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CssMinifyStep").finish_non_exhaustive()
    }
}

impl CssMinifyStep {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl Step for CssMinifyStep {
    fn name(&self) -> &str {
        "css_minify"
    }

    fn transform(&self, mut file: AssetFile) -> Result<AssetFile> {
        let css = compile(self.fs.as_ref(), &file, CssStyle::Compressed, &[])?;
        file.set_text(css);
        Ok(file)
    }
}
