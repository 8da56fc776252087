// tests/dev_session.rs
mod common;
use crate::common::{init_tracing, with_timeout, TestResult};

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assetflow::config::{load_from_str, ConfigFile};
use assetflow::engine::{DevSession, Orchestrator, SessionOptions};
use assetflow::fs::{FileSystem, RealFileSystem};
use assetflow::registry::{FnBody, TaskBody, TaskContext, TaskRegistry};
use assetflow::server::{ReloadEvent, ServerOptions};
use assetflow::watch::WatchBinding;
use tokio::sync::oneshot;

fn counting_registry(runs: &Arc<AtomicUsize>) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    let runs = Arc::clone(runs);
    registry
        .register(
            "sass",
            vec![],
            Arc::new(FnBody::new(move |_ctx| {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })),
        )
        .unwrap();
    registry
}

fn server_for(dir: &Path) -> ServerOptions {
    ServerOptions {
        root: dir.join("src"),
        host: "127.0.0.1".to_string(),
        port: 0,
        inject_changes: true,
        notify: false,
        open: false,
    }
}

/// Poll until `counter` reaches `n`.
async fn wait_for(counter: &AtomicUsize, n: usize) {
    with_timeout(async {
        while counter.load(Ordering::SeqCst) < n {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
}

fn session_options(dir: &Path, reload: bool) -> TestResultOf<SessionOptions> {
    let mut options = SessionOptions::new(dir, vec![WatchBinding::task(&["src/*.scss"], "sass", reload)?]);
    options.debounce = Duration::from_millis(100);
    options.server = Some(server_for(dir));
    Ok(options)
}

type TestResultOf<T> = Result<T, Box<dyn std::error::Error>>;

fn sass_registry(body: Arc<dyn TaskBody>) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register("sass", vec![], body).unwrap();
    registry
}

#[tokio::test]
async fn watched_change_runs_task_once_and_reloads_browsers() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("src"))?;

    let runs = Arc::new(AtomicUsize::new(0));
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let orchestrator = Orchestrator::new(counting_registry(&runs), TaskContext::new(dir.path(), fs))?;

    let mut session = DevSession::start(orchestrator, session_options(dir.path(), true)?).await?;
    assert!(session.server_addr().is_some());
    let mut events = session.notifier().ok_or("no notifier")?.subscribe();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let root = dir.path().to_path_buf();
    let driver = async move {
        for i in 0..5 {
            std::fs::write(root.join("src/style.scss"), format!("a {{ z-index: {i}; }}"))
                .expect("write scss");
        }
        let event = with_timeout(events.recv()).await.expect("reload event");
        // Give a stray second run the chance to show up.
        tokio::time::sleep(Duration::from_millis(400)).await;
        let _ = stop_tx.send(());
        event
    };

    let ((), event) = tokio::join!(
        session.run_until(async move {
            let _ = stop_rx.await;
        }),
        driver
    );

    assert_eq!(event, ReloadEvent::Reload);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    with_timeout(session.stop()).await?;
    Ok(())
}

#[tokio::test]
async fn session_without_server_has_no_notifier() -> TestResult {
    let dir = tempfile::tempdir()?;
    let runs = Arc::new(AtomicUsize::new(0));
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let orchestrator = Orchestrator::new(counting_registry(&runs), TaskContext::new(dir.path(), fs))?;

    let session = DevSession::start(orchestrator, SessionOptions::new(dir.path(), vec![])).await?;
    assert!(session.server_addr().is_none());
    assert!(session.notifier().is_none());
    assert_eq!(session.orchestrator().registry().len(), 1);
    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn rejected_run_keeps_the_session_watching() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("src"))?;

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let body = Arc::new(FnBody::new(move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("syntax error in style.scss");
            }
            Ok(())
        }
    }));
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let orchestrator = Orchestrator::new(sass_registry(body), TaskContext::new(dir.path(), fs))?;

    let mut session = DevSession::start(orchestrator, session_options(dir.path(), true)?).await?;
    let mut events = session.notifier().ok_or("no notifier")?.subscribe();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let root = dir.path().to_path_buf();
    let watched = Arc::clone(&runs);
    let driver = async move {
        std::fs::write(root.join("src/style.scss"), "a {").expect("write scss");
        wait_for(&watched, 1).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(events.try_recv().is_err(), "a rejected run must not reload");

        std::fs::write(root.join("src/style.scss"), "a { color: red; }").expect("write scss");
        let event = with_timeout(events.recv()).await.expect("reload event");
        let _ = stop_tx.send(());
        event
    };

    let ((), event) = tokio::join!(
        session.run_until(async move {
            let _ = stop_rx.await;
        }),
        driver
    );

    assert_eq!(event, ReloadEvent::Reload);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    with_timeout(session.stop()).await?;
    Ok(())
}

#[tokio::test]
async fn triggers_during_a_run_cause_one_follow_up_run() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("src"))?;

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let body = Arc::new(FnBody::new(move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(600)).await;
            Ok(())
        }
    }));
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let orchestrator = Orchestrator::new(sass_registry(body), TaskContext::new(dir.path(), fs))?;

    let mut options = session_options(dir.path(), false)?;
    options.server = None;
    let mut session = DevSession::start(orchestrator, options).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let root = dir.path().to_path_buf();
    let watched = Arc::clone(&runs);
    let driver = async move {
        std::fs::write(root.join("src/a.scss"), "a {}").expect("write scss");
        wait_for(&watched, 1).await;

        // Both land while the first run is still sleeping.
        std::fs::write(root.join("src/a.scss"), "a { b: c; }").expect("write scss");
        std::fs::write(root.join("src/b.scss"), "b {}").expect("write scss");

        wait_for(&watched, 2).await;
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let _ = stop_tx.send(());
    };

    tokio::join!(
        session.run_until(async move {
            let _ = stop_rx.await;
        }),
        driver
    );

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    with_timeout(session.stop()).await?;
    Ok(())
}

#[tokio::test]
async fn stream_pipeline_injects_written_css() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("src/scss"))?;

    let raw = load_from_str(
        r#"
[task.sass]
src = ["src/scss/*.scss"]
dest = "src/css"
stream = true
steps = [{ use = "sass", style = "compressed" }]
"#,
    )?;
    let cfg = ConfigFile::try_from(raw)?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let registry = TaskRegistry::from_config(&cfg, dir.path(), Arc::clone(&fs))?;
    let orchestrator = Orchestrator::new(registry, TaskContext::new(dir.path(), fs))?;

    let mut options = SessionOptions::new(
        dir.path(),
        vec![WatchBinding::task(&["src/scss/*.scss"], "sass", false)?],
    );
    options.debounce = Duration::from_millis(100);
    options.server = Some(server_for(dir.path()));
    let mut session = DevSession::start(orchestrator, options).await?;
    let mut events = session.notifier().ok_or("no notifier")?.subscribe();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let root = dir.path().to_path_buf();
    let driver = async move {
        std::fs::write(root.join("src/scss/main.scss"), "$c: red; a { color: $c; }")
            .expect("write scss");
        let event = with_timeout(events.recv()).await.expect("inject event");
        let _ = stop_tx.send(());
        event
    };

    let ((), event) = tokio::join!(
        session.run_until(async move {
            let _ = stop_rx.await;
        }),
        driver
    );

    assert_eq!(
        event,
        ReloadEvent::Inject {
            paths: vec!["/css/main.css".to_string()]
        }
    );
    assert!(dir.path().join("src/css/main.css").exists());
    with_timeout(session.stop()).await?;
    Ok(())
}
