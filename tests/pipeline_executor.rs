// tests/pipeline_executor.rs
mod common;
use crate::common::{init_tracing, mock_project, TestResult, ROOT};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetflow::fs::{FileSystem, RealFileSystem};
use assetflow::pipeline::steps::{ConcatStep, OrderStep, RenameStep};
use assetflow::pipeline::{execute, FileMatcher, PipelineDef, Step};
use assetflow_test_utils::steps::{FailingStep, UppercaseStep};

fn pipeline_def(src: &[&str], steps: Vec<Arc<dyn Step>>, dest: &str) -> PipelineDef {
    PipelineDef {
        sources: FileMatcher::new(src).expect("valid globs"),
        steps,
        dest: PathBuf::from(dest),
        base: None,
    }
}

#[test]
fn exclusion_removes_matches_of_earlier_includes() -> TestResult {
    let fs = mock_project(&[("a.css", "a"), ("vendor.css", "v"), ("notes.txt", "n")]);
    let matcher = FileMatcher::new(&["*.css", "!vendor.css"])?;

    let rels: Vec<String> = matcher
        .resolve(&fs, Path::new(ROOT))?
        .into_iter()
        .map(|m| m.rel)
        .collect();
    assert_eq!(rels, vec!["a.css"]);
    Ok(())
}

#[test]
fn later_include_wins_over_earlier_exclusion() -> TestResult {
    let matcher = FileMatcher::new(&["src/**/*.js", "!src/vendor/**", "src/vendor/keep.js"])?;
    assert!(matcher.matches("src/app/main.js"));
    assert!(!matcher.matches("src/vendor/jquery.js"));
    assert!(matcher.matches("src/vendor/keep.js"));
    assert!(!matcher.matches("src/app/main.css"));
    Ok(())
}

#[test]
fn star_does_not_cross_directories_but_globstar_does() -> TestResult {
    let shallow = FileMatcher::new(&["src/*.scss"])?;
    assert!(shallow.matches("src/style.scss"));
    assert!(!shallow.matches("src/partials/_vars.scss"));

    let deep = FileMatcher::new(&["src/**/*.{png,jpg}"])?;
    assert!(deep.matches("src/img/a/b.png"));
    assert!(deep.matches("src/c.jpg"));
    assert!(!deep.matches("src/c.gif"));
    Ok(())
}

#[test]
fn failing_file_is_isolated_and_logged_once() -> TestResult {
    init_tracing();
    let fs = mock_project(&[
        ("src/file1.txt", "one"),
        ("src/file2.txt", "two"),
        ("src/file3.txt", "three"),
    ]);
    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(UppercaseStep),
        Arc::new(FailingStep {
            needle: "file2".to_string(),
        }),
    ];

    let report = execute(&fs, Path::new(ROOT), &pipeline_def(&["src/*.txt"], steps, "out"))?;

    assert_eq!(report.matched, 3);
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].step, "failing");
    assert!(report.errors[0].file.ends_with("file2.txt"));
    assert_eq!(fs.contents("site/out/file1.txt").as_deref(), Some("ONE"));
    assert_eq!(fs.contents("site/out/file3.txt").as_deref(), Some("THREE"));
    assert!(fs.contents("site/out/file2.txt").is_none());
    Ok(())
}

#[test]
fn second_run_is_idempotent_and_skips_writes() -> TestResult {
    let fs = mock_project(&[("src/a.txt", "a"), ("src/b.txt", "b")]);
    let pipeline = pipeline_def(&["src/*.txt"], vec![Arc::new(UppercaseStep)], "out");

    let first = execute(&fs, Path::new(ROOT), &pipeline)?;
    let snapshot: Vec<Option<String>> = first.outputs().map(|p| fs.contents(p)).collect();
    let writes = fs.write_count();

    let second = execute(&fs, Path::new(ROOT), &pipeline)?;
    assert!(second.written.is_empty());
    assert_eq!(second.unchanged.len(), 2);
    assert_eq!(fs.write_count(), writes);
    let again: Vec<Option<String>> = second.outputs().map(|p| fs.contents(p)).collect();
    assert_eq!(snapshot, again);
    Ok(())
}

#[test]
fn barrier_sees_every_surviving_file_in_order() -> TestResult {
    let fs = mock_project(&[
        ("js/app.js", "app"),
        ("js/lib/jquery.js", "jq"),
        ("js/util.js", "util"),
    ]);
    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(OrderStep::new(&["lib/**/*.js", "util.js"])?),
        Arc::new(ConcatStep::new("all.js", ";")),
        Arc::new(RenameStep {
            suffix: Some(".min".to_string()),
            ..RenameStep::default()
        }),
    ];

    let report = execute(&fs, Path::new(ROOT), &pipeline_def(&["js/**/*.js"], steps, "dist"))?;

    assert_eq!(report.written, vec![PathBuf::from("site/dist/all.min.js")]);
    assert_eq!(fs.contents("site/dist/all.min.js").as_deref(), Some("jq;util;app"));
    Ok(())
}

#[test]
fn output_paths_keep_structure_below_the_glob_base() -> TestResult {
    let fs = mock_project(&[("src/img/icons/a.svg", "<svg/>"), ("src/img/logo.png", "png")]);

    let report = execute(&fs, Path::new(ROOT), &pipeline_def(&["src/img/**/*"], vec![], "dist/img"))?;
    assert_eq!(report.written.len(), 2);
    assert!(fs.contents("site/dist/img/icons/a.svg").is_some());
    assert!(fs.contents("site/dist/img/logo.png").is_some());

    let mut explicit = pipeline_def(&["src/img/**/*"], vec![], "dist");
    explicit.base = Some(PathBuf::from("src"));
    execute(&fs, Path::new(ROOT), &explicit)?;
    assert!(fs.contents("site/dist/img/icons/a.svg").is_some());
    Ok(())
}

#[test]
fn no_matches_writes_nothing() -> TestResult {
    let fs = mock_project(&[("src/a.txt", "a")]);
    let report = execute(&fs, Path::new(ROOT), &pipeline_def(&["missing/**/*.css"], vec![], "out"))?;
    assert_eq!(report.matched, 0);
    assert!(report.written.is_empty());
    assert!(report.errors.is_empty());
    Ok(())
}

#[test]
fn real_filesystem_round_trip() -> TestResult {
    let dir = tempfile::tempdir()?;
    common::write_tree(dir.path(), &[("src/a.txt", "hello"), ("src/sub/b.txt", "world")])?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let pipeline = pipeline_def(&["src/**/*.txt"], vec![Arc::new(UppercaseStep)], "dist");
    let report = execute(fs.as_ref(), dir.path(), &pipeline)?;
    assert_eq!(report.written.len(), 2);
    assert_eq!(std::fs::read_to_string(dir.path().join("dist/sub/b.txt"))?, "WORLD");

    let again = execute(fs.as_ref(), dir.path(), &pipeline)?;
    assert_eq!(again.unchanged.len(), 2);
    Ok(())
}
