// src/dag/plan.rs

//! Per-run execution plan: which tasks take part and in what order.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::dag::graph::DagGraph;
use crate::errors::{AssetflowError, Result};
use crate::types::TaskName;

/// The transitive closure of the requested tasks, with run-scoped edges and
/// a stable topological order.
///
/// Edges come from two places:
/// - `after`: a dependent waits for its dependency *and* everything in the
///   dependency's sequence.
/// - `sequence = [s1, .., sn]` on task `X`: `s1` waits for `X`, and `s(i+1)`
///   waits for `s(i)` (including its own sequence).
///
/// Ties in the topological order are broken by declaration index.
#[derive(Debug, Clone)]
pub struct RunPlan {
    order: Vec<TaskName>,
    deps: HashMap<TaskName, Vec<TaskName>>,
}

impl RunPlan {
    pub fn build(graph: &DagGraph, requested: &[TaskName]) -> Result<Self> {
        let members = closure(graph, requested)?;
        let deps = scoped_deps(graph, &members);
        let order = stable_toposort(graph, &members, &deps)?;
        debug!(?requested, ?order, "built run plan");

        Ok(Self { order, deps })
    }

    /// Tasks in execution order.
    pub fn order(&self) -> &[TaskName] {
        &self.order
    }

    /// Run-scoped dependencies of a task in this plan.
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.deps.get(name).map(|d| d.as_slice()).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.deps.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Every `(dependency, task)` edge a plan over the whole graph would use.
///
/// Configuration checks run cycle detection over these edges so that a
/// cycle formed only through a sequence's completion set is caught before
/// any run is planned.
pub fn dependency_edges(graph: &DagGraph) -> Vec<(TaskName, TaskName)> {
    let members: HashSet<TaskName> = graph.tasks().map(str::to_string).collect();
    let deps = scoped_deps(graph, &members);

    let mut edges = Vec::new();
    for name in graph.tasks() {
        for dep in deps.get(name).into_iter().flatten() {
            edges.push((dep.clone(), name.to_string()));
        }
    }
    edges
}

fn scoped_deps(graph: &DagGraph, members: &HashSet<TaskName>) -> HashMap<TaskName, Vec<TaskName>> {
    let mut deps: HashMap<TaskName, Vec<TaskName>> = members
        .iter()
        .map(|name| (name.clone(), Vec::new()))
        .collect();

    for name in members {
        for dep in graph.dependencies_of(name) {
            for d in completion_set(graph, dep) {
                push_dep(&mut deps, name, d);
            }
        }

        let mut prev: Vec<TaskName> = vec![name.clone()];
        for item in graph.sequence_of(name) {
            for d in &prev {
                push_dep(&mut deps, item, d.clone());
            }
            prev = completion_set(graph, item);
        }
    }

    deps
}

fn push_dep(deps: &mut HashMap<TaskName, Vec<TaskName>>, task: &str, dep: TaskName) {
    if dep == task {
        return;
    }
    if let Some(list) = deps.get_mut(task) {
        if !list.contains(&dep) {
            list.push(dep);
        }
    }
}

/// Every task reachable from `requested` through `after` and `sequence`.
fn closure(graph: &DagGraph, requested: &[TaskName]) -> Result<HashSet<TaskName>> {
    let mut members = HashSet::new();
    let mut stack: Vec<TaskName> = Vec::new();

    for name in requested {
        if !graph.contains(name) {
            return Err(AssetflowError::UnknownTask(name.clone()));
        }
        stack.push(name.clone());
    }

    while let Some(name) = stack.pop() {
        if !members.insert(name.clone()) {
            continue;
        }
        for next in graph
            .dependencies_of(&name)
            .iter()
            .chain(graph.sequence_of(&name))
        {
            if !graph.contains(next) {
                return Err(AssetflowError::UnknownTask(format!(
                    "'{next}' (referenced by task '{name}')"
                )));
            }
            stack.push(next.clone());
        }
    }

    Ok(members)
}

/// A task plus, recursively, everything in its sequence: the set a dependent
/// has to wait for.
fn completion_set(graph: &DagGraph, name: &str) -> Vec<TaskName> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![name.to_string()];

    while let Some(current) = stack.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        stack.extend(graph.sequence_of(&current).iter().cloned());
        out.push(current);
    }

    out
}

/// Kahn's algorithm with the ready set ordered by declaration index.
fn stable_toposort(
    graph: &DagGraph,
    members: &HashSet<TaskName>,
    deps: &HashMap<TaskName, Vec<TaskName>>,
) -> Result<Vec<TaskName>> {
    let index_of = |name: &str| graph.index_of(name).unwrap_or(usize::MAX);

    let mut indegree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for name in members {
        let list = deps.get(name).map(|d| d.as_slice()).unwrap_or(&[]);
        indegree.insert(name.as_str(), list.len());
        for dep in list {
            dependents.entry(dep.as_str()).or_default().push(name.as_str());
        }
    }

    let mut ready: BTreeSet<(usize, &str)> = indegree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(name, _)| (index_of(*name), *name))
        .collect();

    let mut order = Vec::with_capacity(members.len());
    while let Some((_, name)) = ready.pop_first() {
        order.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(deg) = indegree.get_mut(dependent) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert((index_of(*dependent), *dependent));
                }
            }
        }
    }

    if order.len() < members.len() {
        let stuck = indegree
            .iter()
            .filter(|(_, deg)| **deg > 0)
            .map(|(name, _)| *name)
            .min_by_key(|name| index_of(*name))
            .unwrap_or_default();
        return Err(AssetflowError::CyclicDependency(format!(
            "cycle detected in task graph involving task '{stuck}'"
        )));
    }

    Ok(order)
}
