// src/pipeline/steps/html.rs

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::{bail, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::pipeline::file::AssetFile;
use crate::pipeline::steps::Step;

/// Minify HTML with `minify-html`.
#[derive(Debug, Clone)]
pub struct HtmlMinifyStep {
    pub remove_comments: bool,
}

impl Step for HtmlMinifyStep {
    fn name(&self) -> &str {
        "html_minify"
    }

    fn transform(&self, mut file: AssetFile) -> Result<AssetFile> {
        let mut cfg = minify_html::Cfg::new();
        cfg.keep_comments = !self.remove_comments;
        file.contents = minify_html::minify(&file.contents, &cfg);
        Ok(file)
    }
}

/// Drop lines that are empty or whitespace-only.
#[derive(Debug, Clone, Copy)]
pub struct RemoveEmptyLinesStep;

pub fn remove_empty_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}

impl Step for RemoveEmptyLinesStep {
    fn name(&self) -> &str {
        "remove_empty_lines"
    }

    fn transform(&self, mut file: AssetFile) -> Result<AssetFile> {
        let text = remove_empty_lines(file.text()?);
        file.set_text(text);
        Ok(file)
    }
}

/// A single problem reported by [`lint_html`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintIssue {
    pub rule: &'static str,
    pub line: usize,
    pub message: String,
}

pub const LINT_RULES: &[&str] = &[
    "doctype-first",
    "title-require",
    "id-unique",
    "tagname-lowercase",
    "alt-require",
];

static DOCTYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*<!doctype\s").expect("valid regex"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>\s*[^<\s]").expect("valid regex"));
static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sid\s*=\s*["']([^"']+)["']"#).expect("valid regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?([A-Za-z][A-Za-z0-9-]*)").expect("valid regex"));
static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("valid regex"));
static ALT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\salt\s*=").expect("valid regex"));

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Check `text` against the enabled rules.
pub fn lint_html(text: &str, rules: &[&str]) -> Vec<LintIssue> {
    let enabled = |rule: &str| rules.iter().any(|r| *r == rule);
    let mut issues = Vec::new();

    if enabled("doctype-first") && !DOCTYPE_RE.is_match(text) {
        issues.push(LintIssue {
            rule: "doctype-first",
            line: 1,
            message: "<!DOCTYPE> must be declared first".to_string(),
        });
    }

    if enabled("title-require") && !TITLE_RE.is_match(text) {
        issues.push(LintIssue {
            rule: "title-require",
            line: 1,
            message: "<title> must be present and not empty".to_string(),
        });
    }

    if enabled("id-unique") {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for caps in ID_RE.captures_iter(text) {
            let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let line = line_of(text, whole.start());
            if let Some(first) = seen.insert(id.as_str(), line) {
                issues.push(LintIssue {
                    rule: "id-unique",
                    line,
                    message: format!("id \"{}\" already used on line {first}", id.as_str()),
                });
            }
        }
    }

    if enabled("tagname-lowercase") {
        for caps in TAG_RE.captures_iter(text) {
            let Some(name) = caps.get(1) else { continue };
            if name.as_str().chars().any(|c| c.is_ascii_uppercase()) {
                issues.push(LintIssue {
                    rule: "tagname-lowercase",
                    line: line_of(text, name.start()),
                    message: format!("tag name <{}> must be lowercase", name.as_str()),
                });
            }
        }
    }

    if enabled("alt-require") {
        for img in IMG_RE.find_iter(text) {
            if !ALT_RE.is_match(img.as_str()) {
                issues.push(LintIssue {
                    rule: "alt-require",
                    line: line_of(text, img.start()),
                    message: "<img> must have an alt attribute".to_string(),
                });
            }
        }
    }

    issues.sort_by_key(|i| i.line);
    issues
}

/// Report HTML problems as warnings; the file passes through unchanged.
#[derive(Debug, Clone)]
pub struct HtmlLintStep {
    rules: Vec<&'static str>,
}

impl HtmlLintStep {
    /// `None` enables every rule in [`LINT_RULES`].
    pub fn new<S: AsRef<str>>(rules: Option<&[S]>) -> Result<Self> {
        let rules = match rules {
            None => LINT_RULES.to_vec(),
            Some(names) => {
                let mut selected = Vec::with_capacity(names.len());
                for name in names {
                    let name = name.as_ref();
                    match LINT_RULES.iter().find(|r| **r == name) {
                        Some(rule) => selected.push(*rule),
                        None => bail!("unknown html_lint rule {name:?}"),
                    }
                }
                selected
            }
        };
        Ok(Self { rules })
    }
}

impl Step for HtmlLintStep {
    fn name(&self) -> &str {
        "html_lint"
    }

    fn transform(&self, file: AssetFile) -> Result<AssetFile> {
        let issues = lint_html(file.text()?, &self.rules);
        if issues.is_empty() {
            info!(file = ?file.source, "html_lint: no issues");
        }
        for issue in &issues {
            warn!(
                file = ?file.source,
                rule = issue.rule,
                line = issue.line,
                "{}",
                issue.message
            );
        }
        Ok(file)
    }
}
