// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `assetflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetflow",
    version,
    about = "Run a declarative static-site asset pipeline.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run. Defaults to `[config].default_task`.
    #[arg(value_name = "TASK")]
    pub task: Option<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `$ASSETFLOW_CONFIG`, else `Assetflow.toml` in the current
    /// working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enter watch mode (watcher + dev server) after the task succeeds.
    #[arg(long)]
    pub watch: bool,

    /// Parse + validate, print the run plan, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// List tasks and exit.
    #[arg(long)]
    pub list: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_task_and_flags() {
        let args = CliArgs::parse_from([
            "assetflow",
            "build",
            "--config",
            "site/Assetflow.toml",
            "--dry-run",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.task.as_deref(), Some("build"));
        assert_eq!(args.config, Some(PathBuf::from("site/Assetflow.toml")));
        assert!(args.dry_run);
        assert!(!args.watch);
        assert_eq!(args.log_level, Some(LogLevel::Debug));
    }
}
