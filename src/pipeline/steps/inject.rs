// src/pipeline/steps/inject.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::{Captures, Regex};

use crate::fs::FileSystem;
use crate::pipeline::file::AssetFile;
use crate::pipeline::glob::FileMatcher;
use crate::pipeline::steps::Step;

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)(?P<indent>[ \t]*)(?P<start><!--\s*inject:(?P<kind>[a-z]+)\s*-->)(?P<body>.*?)(?P<end><!--\s*endinject\s*-->)",
    )
    .expect("valid regex")
});

/// Fill `<!-- inject:js -->` / `<!-- inject:css -->` blocks with tags for
/// every source file of that extension.
///
/// Block contents are replaced wholesale, so running twice gives the same
/// result.
pub struct InjectStep {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    sources: FileMatcher,
    ignore_path: Option<String>,
    add_root_slash: bool,
}

impl fmt::Debug for InjectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectStep")
            .field("sources", &self.sources)
            .field("ignore_path", &self.ignore_path)
            .field("add_root_slash", &self.add_root_slash)
            .finish_non_exhaustive()
    }
}

impl InjectStep {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: PathBuf,
        sources: FileMatcher,
        ignore_path: Option<String>,
        add_root_slash: bool,
    ) -> Self {
        Self {
            fs,
            root,
            sources,
            ignore_path,
            add_root_slash,
        }
    }

    fn url_for(&self, rel: &str) -> String {
        let mut url = rel.to_string();
        if let Some(ignore) = &self.ignore_path {
            let ignore = ignore.trim_start_matches("./").trim_matches('/');
            if !ignore.is_empty() {
                if let Some(rest) = url.strip_prefix(ignore) {
                    if let Some(rest) = rest.strip_prefix('/') {
                        url = rest.to_string();
                    }
                }
            }
        }
        if self.add_root_slash {
            url.insert(0, '/');
        }
        url
    }
}

fn tag_for(kind: &str, url: &str) -> Option<String> {
    match kind {
        "js" => Some(format!("<script src=\"{url}\"></script>")),
        "css" => Some(format!("<link rel=\"stylesheet\" href=\"{url}\">")),
        _ => None,
    }
}

/// Rewrite every inject block in `html` with tags for the matching `urls`.
///
/// A block's kind (`js`, `css`) selects URLs with that extension; blocks of
/// unknown kinds are left as they are.
pub fn inject_tags(html: &str, urls: &[String]) -> String {
    BLOCK_RE
        .replace_all(html, |caps: &Captures<'_>| {
            let kind = &caps["kind"];
            let indent = &caps["indent"];
            let tags: Vec<String> = urls
                .iter()
                .filter(|u| u.rsplit('.').next() == Some(kind))
                .filter_map(|u| tag_for(kind, u))
                .collect();

            if tags.is_empty() && tag_for(kind, "").is_none() {
                return caps[0].to_string();
            }

            let mut out = String::new();
            out.push_str(indent);
            out.push_str(&caps["start"]);
            out.push('\n');
            for tag in tags {
                out.push_str(indent);
                out.push_str(&tag);
                out.push('\n');
            }
            out.push_str(indent);
            out.push_str(&caps["end"]);
            out
        })
        .into_owned()
}

impl Step for InjectStep {
    fn name(&self) -> &str {
        "inject"
    }

    fn transform(&self, mut file: AssetFile) -> Result<AssetFile> {
        let urls: Vec<String> = self
            .sources
            .resolve(self.fs.as_ref(), &self.root)?
            .iter()
            .map(|m| self.url_for(&m.rel))
            .collect();
        let html = inject_tags(file.text()?, &urls);
        file.set_text(html);
        Ok(file)
    }
}
