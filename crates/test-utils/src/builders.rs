#![allow(dead_code)]

use assetflow::config::{
    ConfigFile, ConfigSection, RawConfigFile, ServerSection, StepConfig, TaskConfig, TaskTable,
    WatchConfig,
};
use assetflow::types::ExecutionPolicy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                server: None,
                task: TaskTable::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name, task);
        self
    }

    pub fn with_watch(mut self, patterns: &[&str], task: &str) -> Self {
        self.config.watch.push(WatchConfig {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            task: task.to_string(),
            reload: true,
        });
        self
    }

    pub fn with_server(mut self, server: ServerSection) -> Self {
        self.config.server = Some(server);
        self
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.config.config.concurrency = policy;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// A group task with no body.
    pub fn group() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn pipeline(src: &[&str], dest: &str) -> Self {
        Self {
            task: TaskConfig {
                src: Some(src.iter().map(|s| s.to_string()).collect()),
                dest: Some(dest.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn cmd(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn clean(dirs: &[&str]) -> Self {
        Self {
            task: TaskConfig {
                clean: Some(dirs.iter().map(|s| s.to_string()).collect()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn then(mut self, task: &str) -> Self {
        self.task.sequence.push(task.to_string());
        self
    }

    pub fn step(mut self, step: StepConfig) -> Self {
        self.task.steps.push(step);
        self
    }

    pub fn base(mut self, base: &str) -> Self {
        self.task.base = Some(base.to_string());
        self
    }

    pub fn watch(mut self, val: bool) -> Self {
        self.task.watch = val;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
