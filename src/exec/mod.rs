// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`, which tests replace with a fake.
//! - [`task_runner`] runs one task body and reports its completion.
//! - [`command`] runs shell commands for `cmd` tasks.

pub mod backend;
pub mod command;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
