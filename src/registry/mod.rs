// src/registry/mod.rs

//! Task registry: named units of work plus their declared dependencies.
//!
//! The registry is built once (from the config file or programmatically),
//! validated, and is immutable afterwards. Declaration order is preserved
//! and used by the scheduler to break ordering ties.

pub mod body;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::{ConfigFile, TaskConfig, TaskKind};
use crate::dag::{dependency_edges, DagGraph};
use crate::errors::{AssetflowError, Result};
use crate::fs::FileSystem;
use crate::pipeline::{build_step, FileMatcher, PipelineDef, StepContext};
use crate::types::TaskName;

pub use body::{
    CleanBody, CommandBody, FnBody, GroupBody, OutputTracker, PipelineBody, TaskBody, TaskContext,
};

/// A registered task.
pub struct Task {
    pub name: TaskName,
    /// Tasks that must complete before this one starts.
    pub after: Vec<TaskName>,
    /// Tasks run one after another once this task's own body completes.
    pub sequence: Vec<TaskName>,
    pub body: Arc<dyn TaskBody>,
    /// Enter the dev session after this task succeeds.
    pub watch: bool,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("after", &self.after)
            .field("sequence", &self.sequence)
            .field("body", &self.body)
            .field("watch", &self.watch)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    index: HashMap<TaskName, usize>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Dependencies are not checked until [`validate`].
    ///
    /// [`validate`]: TaskRegistry::validate
    pub fn register(
        &mut self,
        name: impl Into<TaskName>,
        dependencies: Vec<TaskName>,
        body: Arc<dyn TaskBody>,
    ) -> Result<&mut Task> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(AssetflowError::DuplicateTask(name));
        }

        let idx = self.tasks.len();
        self.index.insert(name.clone(), idx);
        self.tasks.push(Task {
            name,
            after: dependencies,
            sequence: Vec::new(),
            body,
            watch: false,
        });
        Ok(&mut self.tasks[idx])
    }

    /// Attach a sequence to an already registered task.
    pub fn with_sequence(&mut self, name: &str, sequence: Vec<TaskName>) -> Result<&mut Self> {
        let idx = self.index_of(name)?;
        self.tasks[idx].sequence = sequence;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&Task> {
        let idx = self.index_of(name)?;
        Ok(&self.tasks[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| AssetflowError::UnknownTask(name.to_string()))
    }

    /// Task names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check that every referenced task exists and that the graph formed by
    /// `after` and `sequence` edges is acyclic, including the edges that make
    /// dependents wait for a dependency's whole sequence.
    pub fn validate(&self) -> Result<()> {
        for task in &self.tasks {
            for dep in task.after.iter().chain(task.sequence.iter()) {
                if !self.contains(dep) {
                    return Err(AssetflowError::UnknownTask(format!(
                        "'{dep}' (referenced by task '{}')",
                        task.name
                    )));
                }
            }
        }

        let scoped = dependency_edges(&DagGraph::from_registry(self));
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for task in &self.tasks {
            graph.add_node(task.name.as_str());
        }
        for task in &self.tasks {
            for dep in &task.after {
                graph.add_edge(dep.as_str(), task.name.as_str(), ());
            }
            let mut prev = task.name.as_str();
            for item in &task.sequence {
                graph.add_edge(prev, item.as_str(), ());
                prev = item.as_str();
            }
        }
        for (dep, task) in &scoped {
            graph.add_edge(dep.as_str(), task.as_str(), ());
        }

        toposort(&graph, None).map(|_| ()).map_err(|cycle| {
            AssetflowError::CyclicDependency(format!(
                "cycle detected in task graph involving task '{}'",
                cycle.node_id()
            ))
        })
    }

    /// Build and validate a registry from a validated config file.
    ///
    /// `root` is the project root that every configured path is relative to.
    pub fn from_config(cfg: &ConfigFile, root: &Path, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let step_ctx = StepContext {
            fs,
            root: root.to_path_buf(),
        };

        let mut registry = TaskRegistry::new();
        for (name, tc) in cfg.tasks() {
            let body = body_from_config(name, tc, &step_ctx)?;
            debug!(task = %name, kind = ?tc.kind(), "registering task");
            let task = registry.register(name.clone(), tc.after.clone(), body)?;
            task.sequence = tc.sequence.clone();
            task.watch = tc.watch;
        }

        registry.validate()?;
        Ok(registry)
    }
}

fn body_from_config(name: &str, tc: &TaskConfig, ctx: &StepContext) -> Result<Arc<dyn TaskBody>> {
    let body: Arc<dyn TaskBody> = match tc.kind() {
        TaskKind::Group => Arc::new(GroupBody),
        TaskKind::Command => Arc::new(CommandBody {
            cmd: tc.cmd.clone().unwrap_or_default(),
        }),
        TaskKind::Clean => Arc::new(CleanBody {
            dirs: tc
                .clean
                .iter()
                .flatten()
                .map(PathBuf::from)
                .collect(),
        }),
        TaskKind::Pipeline => {
            let src = tc.src.as_deref().unwrap_or_default();
            let sources = FileMatcher::new(src).map_err(|e| {
                AssetflowError::ConfigError(format!("task '{name}': {e:#}"))
            })?;
            let steps = tc
                .steps
                .iter()
                .map(|s| build_step(s, ctx))
                .collect::<anyhow::Result<Vec<_>>>()
                .map_err(|e| AssetflowError::ConfigError(format!("task '{name}': {e:#}")))?;
            Arc::new(PipelineBody {
                def: PipelineDef {
                    sources,
                    steps,
                    dest: PathBuf::from(tc.dest.clone().unwrap_or_default()),
                    base: tc.base.as_ref().map(PathBuf::from),
                },
                stream: tc.stream,
            })
        }
    };
    Ok(body)
}
