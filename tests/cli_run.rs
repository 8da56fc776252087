// tests/cli_run.rs
mod common;
use crate::common::{init_tracing, with_timeout, write_tree, TestResult};

use assetflow::cli::CliArgs;
use assetflow::errors::AssetflowError;

const CONFIG: &str = r#"
[config]
default_task = "build"

[task.clean]
clean = ["dist"]

[task.html]
after = ["clean"]
src = ["src/**/*.html"]
dest = "dist"
steps = [{ use = "remove_empty_lines" }]

[task.css]
after = ["clean"]
src = ["src/scss/*.scss"]
dest = "dist/css"
steps = [{ use = "sass", style = "compressed" }, { use = "rename", suffix = ".min" }]

[task.build]
after = ["html", "css"]

[task.broken]
cmd = "exit 3"
"#;

fn args(config: &std::path::Path, task: Option<&str>) -> CliArgs {
    CliArgs {
        task: task.map(str::to_string),
        config: Some(config.to_path_buf()),
        watch: false,
        dry_run: false,
        list: false,
        log_level: None,
    }
}

#[tokio::test]
async fn default_task_builds_the_site() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write_tree(
        dir.path(),
        &[
            ("Assetflow.toml", CONFIG),
            ("src/index.html", "<p>a</p>\n\n\n<p>b</p>\n"),
            ("src/scss/main.scss", "$c: blue; a { color: $c; }"),
            ("dist/old.html", "stale"),
        ],
    )?;

    with_timeout(assetflow::run(args(&dir.path().join("Assetflow.toml"), None))).await?;

    let dist = dir.path().join("dist");
    assert_eq!(std::fs::read_to_string(dist.join("index.html"))?, "<p>a</p>\n<p>b</p>\n");
    assert_eq!(std::fs::read_to_string(dist.join("css/main.min.css"))?.trim(), "a{color:blue}");
    assert!(!dist.join("old.html").exists());
    Ok(())
}

#[tokio::test]
async fn failing_command_surfaces_as_rejection() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_tree(dir.path(), &[("Assetflow.toml", CONFIG)])?;

    let err = with_timeout(assetflow::run(args(&dir.path().join("Assetflow.toml"), Some("broken"))))
        .await
        .unwrap_err();
    let rejection = err.downcast_ref::<AssetflowError>();
    assert!(
        matches!(rejection, Some(AssetflowError::TaskRejection { task, .. }) if task == "broken"),
        "{err:#}"
    );
    Ok(())
}

#[tokio::test]
async fn dry_run_and_list_touch_nothing() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_tree(dir.path(), &[("Assetflow.toml", CONFIG), ("dist/keep.txt", "keep")])?;
    let config = dir.path().join("Assetflow.toml");

    let mut dry = args(&config, None);
    dry.dry_run = true;
    with_timeout(assetflow::run(dry)).await?;

    let mut list = args(&config, None);
    list.list = true;
    with_timeout(assetflow::run(list)).await?;

    assert!(dir.path().join("dist/keep.txt").exists());
    assert!(!dir.path().join("dist/index.html").exists());
    Ok(())
}

#[tokio::test]
async fn unknown_task_is_an_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_tree(dir.path(), &[("Assetflow.toml", CONFIG)])?;
    let err = with_timeout(assetflow::run(args(&dir.path().join("Assetflow.toml"), Some("deploy"))))
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<AssetflowError>(), Some(AssetflowError::UnknownTask(_))));
    Ok(())
}
