// tests/pipeline_steps.rs
mod common;
use crate::common::{mock_project, TestResult, ROOT};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetflow::config::StepConfig;
use assetflow::fs::FileSystem;
use assetflow::pipeline::steps::html::{lint_html, remove_empty_lines, LINT_RULES};
use assetflow::pipeline::steps::inject::inject_tags;
use assetflow::pipeline::steps::sass::expand_glob_imports;
use assetflow::pipeline::steps::{
    HtmlLintStep, HtmlMinifyStep, ImageOptimizeStep, JsMinifyStep, SvgSpriteStep, WebpStep,
};
use assetflow::pipeline::{build_step, execute, AssetFile, FileMatcher, PipelineDef, Step, StepContext, StepMode};
use assetflow::types::CssStyle;

fn ctx(fs: &assetflow::fs::mock::MockFileSystem) -> StepContext {
    let fs: Arc<dyn FileSystem> = Arc::new(fs.clone());
    StepContext {
        fs,
        root: PathBuf::from(ROOT),
    }
}

#[test]
fn sass_compiles_imports_and_skips_partials() -> TestResult {
    let fs = mock_project(&[
        ("src/scss/style.scss", "@import 'vars';\na { color: $accent; }\n"),
        ("src/scss/_vars.scss", "$accent: red;\n"),
    ]);
    let sass = build_step(
        &StepConfig::Sass {
            style: CssStyle::Expanded,
            load_paths: vec![],
        },
        &ctx(&fs),
    )?;
    let pipeline = PipelineDef {
        sources: FileMatcher::new(&["src/scss/*.scss"])?,
        steps: vec![sass],
        dest: PathBuf::from("src/css"),
        base: None,
    };

    let report = execute(&fs, Path::new(ROOT), &pipeline)?;

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.written, vec![PathBuf::from("site/src/css/style.css")]);
    let css = fs.contents("site/src/css/style.css").unwrap_or_default();
    assert!(css.contains("color: red"), "{css}");
    Ok(())
}

#[test]
fn sass_syntax_error_fails_only_that_file() -> TestResult {
    let fs = mock_project(&[("scss/good.scss", "b { margin: 0 }"), ("scss/bad.scss", "a { color: ")]);
    let sass = build_step(
        &StepConfig::Sass {
            style: CssStyle::Compressed,
            load_paths: vec![],
        },
        &ctx(&fs),
    )?;
    let pipeline = PipelineDef {
        sources: FileMatcher::new(&["scss/*.scss"])?,
        steps: vec![sass],
        dest: PathBuf::from("css"),
        base: None,
    };

    let report = execute(&fs, Path::new(ROOT), &pipeline)?;
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].step, "sass");
    assert_eq!(report.written, vec![PathBuf::from("site/css/good.css")]);
    Ok(())
}

#[test]
fn sass_glob_imports_pull_in_every_partial() -> TestResult {
    let fs = mock_project(&[
        ("src/scss/main.scss", "@import \"components/*\";\nbody { margin: 0; }\n"),
        ("src/scss/components/_button.scss", ".button { color: red; }\n"),
        ("src/scss/components/_card.scss", ".card { padding: 0; }\n"),
        ("src/scss/components/readme.md", "not a stylesheet"),
    ]);

    let expanded = expand_glob_imports(
        &fs,
        Path::new("site/src/scss/main.scss"),
        "@import \"components/*\";",
    )?;
    assert_eq!(
        expanded,
        "@import \"components/_button\";\n@import \"components/_card\";\n"
    );

    let sass = build_step(
        &StepConfig::Sass {
            style: CssStyle::Expanded,
            load_paths: vec![],
        },
        &ctx(&fs),
    )?;
    let pipeline = PipelineDef {
        sources: FileMatcher::new(&["src/scss/*.scss"])?,
        steps: vec![sass],
        dest: PathBuf::from("dist/css"),
        base: None,
    };
    let report = execute(&fs, Path::new(ROOT), &pipeline)?;

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    let css = fs.contents("site/dist/css/main.css").unwrap_or_default();
    let button = css.find(".button").ok_or("button missing")?;
    let card = css.find(".card").ok_or("card missing")?;
    assert!(button < card, "{css}");
    Ok(())
}

#[test]
fn css_minify_compresses() -> TestResult {
    let fs = mock_project(&[]);
    let step = build_step(&StepConfig::CssMinify, &ctx(&fs))?;
    let out = step.transform(AssetFile::new("a.css", "a {\n  color: red;\n}\n"))?;
    assert_eq!(out.text()?.trim(), "a{color:red}");
    Ok(())
}

#[test]
fn rename_builds_min_names() -> TestResult {
    let fs = mock_project(&[]);
    let step = build_step(
        &StepConfig::Rename {
            file_name: None,
            extension: None,
            suffix: Some(".min".to_string()),
        },
        &ctx(&fs),
    )?;
    let out = step.transform(AssetFile::new("js/main.js", "x"))?;
    assert_eq!(out.relative, PathBuf::from("js/main.min.js"));

    let step = build_step(
        &StepConfig::Rename {
            file_name: Some("index.html".to_string()),
            extension: None,
            suffix: None,
        },
        &ctx(&fs),
    )?;
    let out = step.transform(AssetFile::new("pages/home.html", "x"))?;
    assert_eq!(out.relative, PathBuf::from("pages/index.html"));
    Ok(())
}

#[test]
fn html_minify_drops_comments_and_whitespace() -> TestResult {
    let html = "<html>\n  <body>\n    <!-- note -->\n    <p>  hi  </p>\n  </body>\n</html>\n";
    let out = HtmlMinifyStep {
        remove_comments: true,
    }
    .transform(AssetFile::new("index.html", html))?;
    let text = out.text()?;
    assert!(!text.contains("note"));
    assert!(text.len() < html.len());
    assert!(text.contains("hi"));
    Ok(())
}

#[test]
fn remove_empty_lines_keeps_content_lines() {
    assert_eq!(remove_empty_lines("a\n\n  \nb\n\t\nc"), "a\nb\nc\n");
}

#[test]
fn html_lint_reports_without_failing() -> TestResult {
    let html = "<html><head></head><body><IMG src=\"x.png\"><p id=\"a\"></p><p id=\"a\"></p></body></html>";
    let issues = lint_html(html, LINT_RULES);
    let rules: Vec<&str> = issues.iter().map(|i| i.rule).collect();
    for expected in ["doctype-first", "title-require", "id-unique", "tagname-lowercase", "alt-require"] {
        assert!(rules.contains(&expected), "missing {expected} in {rules:?}");
    }

    let step = HtmlLintStep::new(None::<&[&str]>)?;
    let file = AssetFile::new("index.html", html);
    assert_eq!(step.transform(file.clone())?, file);

    assert!(HtmlLintStep::new(Some(&["no-such-rule"][..])).is_err());
    Ok(())
}

#[test]
fn clean_document_has_no_lint_issues() {
    let html = "<!DOCTYPE html>\n<html><head><title>Home</title></head>\n<body><img src=\"a.png\" alt=\"a\"></body></html>";
    assert!(lint_html(html, LINT_RULES).is_empty());
}

#[test]
fn inject_fills_blocks_by_extension() {
    let html = "<head>\n  <!-- inject:css -->\n  <!-- endinject -->\n</head>\n<body>\n  <!-- inject:js -->\n  <script src=\"/old.js\"></script>\n  <!-- endinject -->\n</body>";
    let urls = vec!["/css/style.css".to_string(), "/js/app.js".to_string()];

    let out = inject_tags(html, &urls);

    assert!(out.contains("  <link rel=\"stylesheet\" href=\"/css/style.css\">\n"));
    assert!(out.contains("  <script src=\"/js/app.js\"></script>\n"));
    assert!(!out.contains("old.js"));
    assert_eq!(inject_tags(&out, &urls), out);
}

#[test]
fn inject_step_resolves_sources_relative_to_ignore_path() -> TestResult {
    let fs = mock_project(&[
        ("src/index.html", "<!-- inject:js -->\n<!-- endinject -->\n"),
        ("src/js/a.js", "a"),
        ("src/js/b.js", "b"),
    ]);
    let step = build_step(
        &StepConfig::Inject {
            sources: vec!["src/js/*.js".to_string()],
            ignore_path: Some("src".to_string()),
            add_root_slash: true,
        },
        &ctx(&fs),
    )?;

    let out = step.transform(AssetFile::new("index.html", "<!-- inject:js -->\n<!-- endinject -->\n"))?;
    let text = out.text()?;
    assert!(text.contains("<script src=\"/js/a.js\"></script>"));
    assert!(text.contains("<script src=\"/js/b.js\"></script>"));
    Ok(())
}

#[test]
fn svg_sprite_merges_icons_into_symbols() -> TestResult {
    let step = SvgSpriteStep::new("sprite.svg", false);
    assert_eq!(step.mode(), StepMode::Barrier);

    let files = vec![
        AssetFile::new("icon-home.svg", "<svg viewBox=\"0 0 10 10\"><path d=\"M0 0\"/></svg>"),
        AssetFile::new("icon-user.svg", "<?xml version=\"1.0\"?><svg width=\"24\" height=\"24\"><circle r=\"4\"/></svg>"),
    ];
    let out = step.aggregate(files)?;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].relative, PathBuf::from("sprite.svg"));
    let text = out[0].text()?;
    assert!(text.starts_with("<?xml"));
    assert!(text.contains("<symbol id=\"icon-home\" viewBox=\"0 0 10 10\"><path d=\"M0 0\"/></symbol>"));
    assert!(text.contains("<symbol id=\"icon-user\" viewBox=\"0 0 24 24\"><circle r=\"4\"/></symbol>"));
    Ok(())
}

#[test]
fn svg_sprite_rejects_duplicate_ids() {
    let step = SvgSpriteStep::new("sprite.svg", true);
    let files = vec![
        AssetFile::new("a/icon.svg", "<svg></svg>"),
        AssetFile::new("b/icon.svg", "<svg></svg>"),
    ];
    assert!(step.aggregate(files).is_err());
}

#[test]
fn js_minify_shrinks_and_isolates_syntax_errors() -> TestResult {
    let source = "const main = () => {\n  let my_first_variable = 1;\n  return my_first_variable;\n};\n";
    let out = JsMinifyStep.transform(AssetFile::new("js/main.js", source))?;
    let text = out.text()?;
    assert!(text.len() < source.len(), "{text}");
    assert!(!text.contains("my_first_variable"), "{text}");
    assert_eq!(out.relative, PathBuf::from("js/main.js"));

    let fs = mock_project(&[("js/good.js", source), ("js/bad.js", "let = = ;")]);
    let step = build_step(&StepConfig::JsMinify, &ctx(&fs))?;
    let pipeline = PipelineDef {
        sources: FileMatcher::new(&["js/*.js"])?,
        steps: vec![step],
        dest: PathBuf::from("dist"),
        base: None,
    };
    let report = execute(&fs, Path::new(ROOT), &pipeline)?;
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].step, "js_minify");
    assert_eq!(report.written, vec![PathBuf::from("site/dist/good.js")]);
    Ok(())
}

fn gradient(width: u32, height: u32) -> image::RgbImage {
    image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 4) as u8, (y * 4) as u8, ((x * 7) ^ (y * 13)) as u8])
    })
}

fn encode(img: &image::RgbImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut out, format)
        .expect("encode test image");
    out.into_inner()
}

#[test]
fn image_optimize_recompresses_png_and_jpeg() -> TestResult {
    use image::codecs::jpeg::JpegEncoder;

    let img = gradient(48, 48);
    let png = encode(&img, image::ImageFormat::Png);
    let mut jpeg = Vec::new();
    image::DynamicImage::ImageRgb8(img.clone())
        .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, 100))?;

    let step = ImageOptimizeStep {
        png_level: 2,
        jpeg_quality: 50,
    };

    let out = step.transform(AssetFile::new("img/a.png", png.clone()))?;
    assert!(out.contents.len() <= png.len());
    let decoded = image::load_from_memory(&out.contents)?.to_rgb8();
    assert_eq!(decoded, img);

    let out = step.transform(AssetFile::new("img/b.jpg", jpeg.clone()))?;
    assert!(out.contents.len() < jpeg.len());
    assert_eq!(image::load_from_memory(&out.contents)?.width(), 48);

    let svg = AssetFile::new("img/c.svg", "<svg/>");
    assert_eq!(step.transform(svg.clone())?, svg);

    assert!(step.transform(AssetFile::new("img/broken.png", "not a png")).is_err());
    Ok(())
}

#[test]
fn webp_converts_and_renames_images() -> TestResult {
    let img = gradient(16, 8);
    let out = WebpStep.transform(AssetFile::new("img/logo.png", encode(&img, image::ImageFormat::Png)))?;

    assert_eq!(out.relative, PathBuf::from("img/logo.webp"));
    assert_eq!(&out.contents[..4], b"RIFF");
    assert_eq!(&out.contents[8..12], b"WEBP");
    let decoded = image::load_from_memory_with_format(&out.contents, image::ImageFormat::WebP)?;
    assert_eq!((decoded.width(), decoded.height()), (16, 8));

    let gif = AssetFile::new("img/anim.gif", "GIF89a");
    assert_eq!(WebpStep.transform(gif.clone())?, gif);
    Ok(())
}
