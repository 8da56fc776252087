// tests/registry_and_plan.rs
mod common;
use crate::common::{init_tracing, TestResult};

use std::sync::Arc;

use assetflow::dag::{DagGraph, RunPlan};
use assetflow::errors::AssetflowError;
use assetflow::registry::{GroupBody, TaskBody, TaskRegistry};

fn group() -> Arc<dyn TaskBody> {
    Arc::new(GroupBody)
}

fn deps(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn plan_for(registry: &TaskRegistry, requested: &[&str]) -> Result<RunPlan, AssetflowError> {
    registry.validate()?;
    let graph = DagGraph::from_registry(registry);
    RunPlan::build(&graph, &deps(requested))
}

fn position(plan: &RunPlan, name: &str) -> usize {
    plan.order()
        .iter()
        .position(|n| n == name)
        .unwrap_or_else(|| panic!("{name} not in plan"))
}

#[test]
fn duplicate_registration_is_rejected() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register("sass", vec![], group())?;
    let err = registry.register("sass", vec![], group()).unwrap_err();
    assert!(matches!(err, AssetflowError::DuplicateTask(ref n) if n == "sass"));
    assert_eq!(registry.len(), 1);
    Ok(())
}

#[test]
fn unknown_lookup_and_dependency_are_rejected() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register("build", deps(&["clean"]), group())?;

    assert!(matches!(registry.get("nope"), Err(AssetflowError::UnknownTask(_))));
    let err = registry.validate().unwrap_err();
    assert!(matches!(err, AssetflowError::UnknownTask(ref m) if m.contains("clean")));
    Ok(())
}

#[test]
fn cycle_through_a_sequence_is_rejected_by_validate() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register("x", vec![], group())?;
    registry.register("a", deps(&["x"]), group())?;
    registry.register("s", deps(&["a"]), group())?;
    registry.with_sequence("x", deps(&["s"]))?;

    let err = registry.validate().unwrap_err();
    assert!(matches!(err, AssetflowError::CyclicDependency(_)), "{err:?}");
    Ok(())
}

#[test]
fn cycle_is_rejected_before_planning() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register("A", deps(&["C"]), group())?;
    registry.register("B", deps(&["A"]), group())?;
    registry.register("C", deps(&["B"]), group())?;

    let err = registry.validate().unwrap_err();
    assert!(matches!(err, AssetflowError::CyclicDependency(_)));
    Ok(())
}

#[test]
fn plan_contains_only_the_transitive_closure() -> TestResult {
    init_tracing();
    let mut registry = TaskRegistry::new();
    registry.register("clean", vec![], group())?;
    registry.register("sass", vec![], group())?;
    registry.register("js", vec![], group())?;
    registry.register("css", deps(&["sass"]), group())?;
    registry.register("build", deps(&["clean", "css"]), group())?;

    let plan = plan_for(&registry, &["build"])?;
    assert_eq!(plan.order(), &["clean", "sass", "css", "build"]);
    assert!(!plan.contains("js"));
    assert_eq!(plan.dependencies_of("build"), &["clean", "css"]);
    Ok(())
}

#[test]
fn ties_are_broken_by_declaration_order() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register("zeta", vec![], group())?;
    registry.register("alpha", vec![], group())?;
    registry.register("mid", vec![], group())?;
    registry.register("all", deps(&["mid", "alpha", "zeta"]), group())?;

    let plan = plan_for(&registry, &["all"])?;
    assert_eq!(plan.order(), &["zeta", "alpha", "mid", "all"]);
    Ok(())
}

#[test]
fn sequence_runs_after_owner_and_in_order() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register("clean", vec![], group())?;
    registry.register("js", vec![], group())?;
    registry.register("css", vec![], group())?;
    registry.register("build", deps(&["clean"]), group())?;
    registry.with_sequence("build", deps(&["css", "js"]))?;
    registry.register("deploy", deps(&["build"]), group())?;

    let plan = plan_for(&registry, &["deploy"])?;
    assert!(position(&plan, "build") < position(&plan, "css"));
    assert!(position(&plan, "css") < position(&plan, "js"));
    // A dependent of `build` waits for its whole sequence.
    assert!(position(&plan, "js") < position(&plan, "deploy"));
    assert!(plan.dependencies_of("deploy").contains(&"js".to_string()));
    assert_eq!(plan.dependencies_of("css"), &["build"]);
    Ok(())
}

#[test]
fn unknown_requested_task_is_rejected() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register("a", vec![], group())?;
    let err = plan_for(&registry, &["b"]).unwrap_err();
    assert!(matches!(err, AssetflowError::UnknownTask(_)));
    Ok(())
}
