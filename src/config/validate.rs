// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, TaskKind};
use crate::dag::{dependency_edges, DagGraph};
use crate::errors::{AssetflowError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Run every configuration check; the first failure wins.
pub fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_bodies(cfg)?;
    validate_task_references(cfg)?;
    validate_watch_bindings(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(AssetflowError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(AssetflowError::ConfigError(
            "[config].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_bodies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.declared_bodies() > 1 {
            return Err(AssetflowError::ConfigError(format!(
                "task '{name}' declares more than one of `src`, `clean`, `cmd`"
            )));
        }
        match task.kind() {
            TaskKind::Pipeline => {
                if task.dest.is_none() {
                    return Err(AssetflowError::ConfigError(format!(
                        "task '{name}' has `src` but no `dest`"
                    )));
                }
                if task.src.as_ref().is_some_and(|src| src.is_empty()) {
                    return Err(AssetflowError::ConfigError(format!(
                        "task '{name}' has an empty `src` list"
                    )));
                }
            }
            _ => {
                if !task.steps.is_empty() || task.dest.is_some() {
                    return Err(AssetflowError::ConfigError(format!(
                        "task '{name}' has `steps`/`dest` but no `src`"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_task_references(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(AssetflowError::CyclicDependency(format!(
                    "task '{name}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.task.contains_key(dep) {
                return Err(AssetflowError::UnknownTask(format!(
                    "'{dep}' (referenced in `after` of task '{name}')"
                )));
            }
        }
        for item in task.sequence.iter() {
            if item == name {
                return Err(AssetflowError::CyclicDependency(format!(
                    "task '{name}' cannot list itself in `sequence`"
                )));
            }
            if !cfg.task.contains_key(item) {
                return Err(AssetflowError::UnknownTask(format!(
                    "'{item}' (referenced in `sequence` of task '{name}')"
                )));
            }
        }
    }
    Ok(())
}

fn validate_watch_bindings(cfg: &RawConfigFile) -> Result<()> {
    for binding in cfg.watch.iter() {
        if !cfg.task.contains_key(&binding.task) {
            return Err(AssetflowError::UnknownTask(format!(
                "'{}' (referenced by a [[watch]] binding)",
                binding.task
            )));
        }
        if binding.patterns.is_empty() {
            return Err(AssetflowError::ConfigError(format!(
                "[[watch]] binding for task '{}' has no patterns",
                binding.task
            )));
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task.
    // `after = ["A"]` on B adds A -> B; `sequence = [S1, S2]` on X adds
    // X -> S1 -> S2. Dependents of X also wait for S1 and S2.
    let dag = DagGraph::from_tasks(
        cfg.task
            .iter()
            .map(|(name, t)| (name.as_str(), t.after.as_slice(), t.sequence.as_slice())),
    );
    let scoped = dependency_edges(&dag);
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
        let mut prev = name.as_str();
        for item in task.sequence.iter() {
            graph.add_edge(prev, item.as_str(), ());
            prev = item.as_str();
        }
    }
    for (dep, task) in &scoped {
        graph.add_edge(dep.as_str(), task.as_str(), ());
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(AssetflowError::CyclicDependency(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}
