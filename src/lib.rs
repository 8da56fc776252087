// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::engine::{DevSession, Orchestrator, SessionOptions};
use crate::fs::{FileSystem, RealFileSystem};
use crate::registry::{TaskContext, TaskRegistry};
use crate::server::ServerOptions;
use crate::watch::bindings_from_config;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - task registry + orchestrator
/// - (optional) dev session: watcher, dev server, Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)?;
    let root = config_root_dir(&config_path);
    debug!(config = ?config_path, root = ?root, "config loaded");

    if args.list {
        for (name, _) in cfg.tasks() {
            println!("{name}");
        }
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let registry = TaskRegistry::from_config(&cfg, &root, fs.clone())?;
    let orchestrator = Orchestrator::new(registry, TaskContext::new(&root, fs))?
        .with_policy(cfg.config.concurrency);

    let task = args
        .task
        .clone()
        .unwrap_or_else(|| cfg.config.default_task.clone());

    if args.dry_run {
        print_dry_run(&cfg, &orchestrator, &task)?;
        return Ok(());
    }

    let report = orchestrator.run(&task).await?;
    info!(task = %task, completed = report.completed.len(), "build finished");

    let enter_watch = args.watch || orchestrator.registry().get(&task)?.watch;
    if !enter_watch {
        return Ok(());
    }

    let options = session_options(&cfg, &root)?;
    let session = DevSession::start(orchestrator, options).await?;
    if let Some(addr) = session.server_addr() {
        info!("serving on http://{addr}");
    }
    session.run_until_shutdown().await?;
    Ok(())
}

fn session_options(cfg: &ConfigFile, root: &Path) -> Result<SessionOptions> {
    let mut options = SessionOptions::new(root, bindings_from_config(&cfg.watch)?);
    options.debounce = Duration::from_millis(cfg.config.debounce_ms);
    options.server = cfg
        .server
        .as_ref()
        .map(|section| ServerOptions::from_section(section, root));
    options.behaviour = cfg.config.triggered_while_running_behaviour;
    options.queue_length = cfg.config.queue_length;
    Ok(options)
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Assetflow.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Assetflow.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print the resolved run plan for `task` without running anything.
fn print_dry_run(cfg: &ConfigFile, orchestrator: &Orchestrator, task: &str) -> Result<()> {
    let plan = orchestrator.plan(&[task.to_string()])?;

    println!("assetflow dry-run");
    println!("  config.concurrency = {:?}", cfg.config.concurrency);
    println!(
        "  config.triggered_while_running_behaviour = {:?}",
        cfg.config.triggered_while_running_behaviour
    );
    println!("  server = {}", if cfg.server.is_some() { "on" } else { "off" });
    println!();

    println!("plan for '{task}' ({} tasks):", plan.len());
    for (i, name) in plan.order().iter().enumerate() {
        match cfg.task(name) {
            Some(tc) => println!("  {}. {name} ({:?})", i + 1, tc.kind()),
            None => println!("  {}. {name}", i + 1),
        }
        let deps = plan.dependencies_of(name);
        if !deps.is_empty() {
            println!("      waits for: {deps:?}");
        }
    }

    if !cfg.watch.is_empty() {
        println!();
        println!("watch bindings ({}):", cfg.watch.len());
        for binding in &cfg.watch {
            println!("  - {:?} -> {}", binding.patterns, binding.task);
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
