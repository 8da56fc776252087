// src/dag/graph.rs

use std::collections::HashMap;

use crate::registry::TaskRegistry;
use crate::types::TaskName;

/// Internal node structure: stores immediate deps and sequence.
#[derive(Debug, Clone)]
struct DagNode {
    /// Declaration index, used to break ordering ties.
    index: usize,
    /// Direct dependencies: tasks that must complete before this one starts.
    deps: Vec<TaskName>,
    /// Tasks run one after another once this one completes.
    sequence: Vec<TaskName>,
}

/// In-memory task graph keyed by task name.
///
/// Acyclicity is checked by [`TaskRegistry::validate`] and again per run by
/// [`RunPlan`](crate::dag::RunPlan); here we only keep adjacency
/// information for planning and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: HashMap<TaskName, DagNode>,
    /// Task names in declaration order.
    order: Vec<TaskName>,
}

impl DagGraph {
    pub fn from_registry(registry: &TaskRegistry) -> Self {
        Self::from_tasks(
            registry
                .tasks()
                .map(|t| (t.name.as_str(), t.after.as_slice(), t.sequence.as_slice())),
        )
    }

    /// Build from `(name, after, sequence)` triples in declaration order.
    pub fn from_tasks<'a, I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [TaskName], &'a [TaskName])>,
    {
        let mut nodes: HashMap<TaskName, DagNode> = HashMap::new();
        let mut order = Vec::new();

        for (index, (name, after, sequence)) in tasks.into_iter().enumerate() {
            order.push(name.to_string());
            nodes.insert(
                name.to_string(),
                DagNode {
                    index,
                    deps: after.to_vec(),
                    sequence: sequence.to_vec(),
                },
            );
        }

        Self { nodes, order }
    }

    /// All task names, in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.get(name).map(|n| n.index)
    }

    /// Immediate dependencies of a task (the tasks listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn sequence_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.sequence.as_slice())
            .unwrap_or(&[])
    }
}
