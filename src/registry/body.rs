// src/registry/body.rs

//! Task bodies: the unit of work a task performs once its dependencies
//! have completed.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use tracing::{debug, info};

use crate::exec::command::run_shell;
use crate::fs::FileSystem;
use crate::pipeline::{execute, PipelineDef};
use crate::server::{ChangeSet, ReloadNotifier};

/// Environment handed to a task body when it runs.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Project root; every configured path is relative to it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    /// Present while a dev session with a server is active.
    pub notifier: Option<ReloadNotifier>,
    pub run_id: u64,
    /// Shared by every task of one run.
    pub outputs: OutputTracker,
}

/// Records whether any task of a run touched files on disk.
///
/// Pipelines mark it only when they actually wrote something; bodies whose
/// effects are opaque (commands, closures) always mark it.
#[derive(Debug, Clone, Default)]
pub struct OutputTracker(Arc<AtomicBool>);

impl OutputTracker {
    pub fn mark(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn changed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl TaskContext {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
            notifier: None,
            run_id: 0,
            outputs: OutputTracker::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: ReloadNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

/// Something a task does. Completion of the returned future is the task's
/// completion signal; an error rejects the task.
pub trait TaskBody: Send + Sync + fmt::Debug {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<()>>;
}

/// Body of a task that only aggregates its dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupBody;

impl TaskBody for GroupBody {
    fn run<'a>(&'a self, _ctx: &'a TaskContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Runs a stream pipeline on a blocking thread.
#[derive(Debug, Clone)]
pub struct PipelineBody {
    pub def: PipelineDef,
    /// Push written files to connected browsers as soon as they land.
    pub stream: bool,
}

impl TaskBody for PipelineBody {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let fs = Arc::clone(&ctx.fs);
            let root = ctx.root.clone();
            let def = self.def.clone();

            let report = tokio::task::spawn_blocking(move || execute(fs.as_ref(), &root, &def))
                .await
                .context("pipeline worker panicked")??;

            if !report.written.is_empty() {
                ctx.outputs.mark();
            }
            if self.stream && !report.written.is_empty() {
                if let Some(notifier) = &ctx.notifier {
                    notifier.notify(&ChangeSet::new(report.written.clone()));
                }
            }
            Ok(())
        })
    }
}

/// Empties directories, keeping the directories themselves.
#[derive(Debug, Clone)]
pub struct CleanBody {
    pub dirs: Vec<PathBuf>,
}

impl TaskBody for CleanBody {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for dir in &self.dirs {
                let dir = ctx.root.join(dir);
                if !ctx.fs.is_dir(&dir) {
                    debug!(?dir, "clean: directory does not exist, skipping");
                    continue;
                }
                let mut removed = 0usize;
                for entry in ctx.fs.read_dir(&dir)? {
                    if ctx.fs.is_dir(&entry) {
                        ctx.fs.remove_dir_all(&entry)?;
                    } else {
                        ctx.fs.remove_file(&entry)?;
                    }
                    removed += 1;
                }
                if removed > 0 {
                    ctx.outputs.mark();
                }
                info!(?dir, removed, "cleaned directory");
            }
            Ok(())
        })
    }
}

/// Runs a shell command in the project root; a non-zero exit rejects the task.
#[derive(Debug, Clone)]
pub struct CommandBody {
    pub cmd: String,
}

impl TaskBody for CommandBody {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<()>> {
        ctx.outputs.mark();
        Box::pin(run_shell(&self.cmd, &ctx.root))
    }
}

/// Adapts an async closure into a [`TaskBody`].
pub struct FnBody<F> {
    f: F,
}

impl<F> FnBody<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnBody<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBody").finish_non_exhaustive()
    }
}

impl<F, Fut> TaskBody for FnBody<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<()>> {
        ctx.outputs.mark();
        Box::pin((self.f)(ctx.clone()))
    }
}
