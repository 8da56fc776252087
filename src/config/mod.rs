// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: task references, body shapes, cycles.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    ConfigFile, ConfigSection, RawConfigFile, ServerSection, StepConfig, TaskConfig, TaskKind,
    TaskTable, WatchConfig,
};
pub use validate::validate_raw_config;
