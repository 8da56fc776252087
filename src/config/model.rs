// src/config/model.rs

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::types::{CssStyle, ExecutionPolicy, TaskName, TriggerWhileRunningBehaviour};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// default_task = "default"
/// concurrency = "parallel"
///
/// [server]
/// root = "src"
/// port = 3000
///
/// [task.sass]
/// src = ["src/scss/style.scss"]
/// dest = "src/css"
/// steps = [{ use = "sass" }]
///
/// [[watch]]
/// patterns = ["src/scss/**/*.scss"]
/// task = "sass"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Dev server options from `[server]`; no server is started without it.
    #[serde(default)]
    pub server: Option<ServerSection>,

    /// All tasks from `[task.<name>]`, in declaration order.
    #[serde(default)]
    pub task: TaskTable,

    /// Watch bindings from `[[watch]]`.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`),
/// so holders can rely on dependency references being resolvable and the
/// graph being acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub server: Option<ServerSection>,
    pub task: TaskTable,
    pub watch: Vec<WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            server: raw.server,
            task: raw.task,
            watch: raw.watch,
        }
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = (&TaskName, &TaskConfig)> {
        self.task.iter()
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.get(name)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Task to run when none is given on the command line.
    #[serde(default = "default_task_name")]
    pub default_task: TaskName,

    /// `"parallel"` (default) or `"serial"`.
    #[serde(default)]
    pub concurrency: ExecutionPolicy,

    /// `"queue"` or `"cancel"`; what the dev session does with watch
    /// triggers that arrive while a run is active.
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Maximum number of queued batches to remember.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// Debounce window for filesystem events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_task_name() -> TaskName {
    "default".to_string()
}

fn default_queue_length() -> usize {
    1
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default_task: default_task_name(),
            concurrency: ExecutionPolicy::default(),
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: default_queue_length(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Directory served as the site root, relative to the project root.
    #[serde(default = "default_server_root")]
    pub root: String,

    #[serde(default = "default_host")]
    pub host: String,

    /// `0` binds an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Push CSS-only changes into the page instead of reloading it.
    #[serde(default = "default_true")]
    pub inject_changes: bool,

    /// Show a small on-page indicator when a change arrives.
    #[serde(default)]
    pub notify: bool,

    /// Open a browser at startup.
    #[serde(default)]
    pub open: bool,
}

fn default_server_root() -> String {
    "src".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            root: default_server_root(),
            host: default_host(),
            port: default_port(),
            inject_changes: true,
            notify: false,
            open: false,
        }
    }
}

/// `[task.<name>]` section.
///
/// The body of a task is picked from whichever of these is present:
/// - `src` + `dest` (+ `steps`): a file pipeline
/// - `clean`: directories to empty
/// - `cmd`: a shell command
/// - none of the above: a group task that only exists for its dependencies
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TaskConfig {
    /// Tasks that must complete before this one starts.
    #[serde(default)]
    pub after: Vec<TaskName>,

    /// Tasks run strictly one after another once this task's body is done.
    #[serde(default)]
    pub sequence: Vec<TaskName>,

    /// Source glob set; `!` marks an exclusion.
    #[serde(default)]
    pub src: Option<Vec<String>>,

    /// Destination directory for pipeline output.
    #[serde(default)]
    pub dest: Option<String>,

    /// Explicit base directory that output paths are made relative to.
    #[serde(default)]
    pub base: Option<String>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,

    /// Push written CSS files to connected browsers as they are produced.
    #[serde(default)]
    pub stream: bool,

    #[serde(default)]
    pub clean: Option<Vec<String>>,

    #[serde(default)]
    pub cmd: Option<String>,

    /// Enter the dev session (watcher + server) after this task succeeds.
    #[serde(default)]
    pub watch: bool,
}

/// What kind of body a task config describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Pipeline,
    Clean,
    Command,
    Group,
}

impl TaskConfig {
    pub fn kind(&self) -> TaskKind {
        if self.src.is_some() {
            TaskKind::Pipeline
        } else if self.clean.is_some() {
            TaskKind::Clean
        } else if self.cmd.is_some() {
            TaskKind::Command
        } else {
            TaskKind::Group
        }
    }

    /// Number of distinct body kinds declared; more than one is a config error.
    pub(crate) fn declared_bodies(&self) -> usize {
        [self.src.is_some(), self.clean.is_some(), self.cmd.is_some()]
            .into_iter()
            .filter(|b| *b)
            .count()
    }
}

/// One entry of a task's `steps = [...]` list, selected by `use = "<name>"`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "use", rename_all = "snake_case")]
pub enum StepConfig {
    Sass {
        #[serde(default)]
        style: CssStyle,
        #[serde(default)]
        load_paths: Vec<String>,
    },
    CssMinify,
    Concat {
        file: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
    Order {
        patterns: Vec<String>,
    },
    Rename {
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        extension: Option<String>,
        #[serde(default)]
        suffix: Option<String>,
    },
    HtmlMinify {
        #[serde(default = "default_true")]
        remove_comments: bool,
    },
    RemoveEmptyLines,
    HtmlLint {
        #[serde(default)]
        rules: Option<Vec<String>>,
    },
    Inject {
        sources: Vec<String>,
        #[serde(default)]
        ignore_path: Option<String>,
        #[serde(default = "default_true")]
        add_root_slash: bool,
    },
    SvgSprite {
        #[serde(default = "default_sprite_name")]
        file: String,
        #[serde(default)]
        inline: bool,
    },
    JsMinify,
    ImageOptimize {
        #[serde(default = "default_png_level")]
        png_level: u8,
        #[serde(default = "default_jpeg_quality")]
        jpeg_quality: u8,
    },
    Webp,
}

fn default_separator() -> String {
    "\n".to_string()
}

fn default_png_level() -> u8 {
    2
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_sprite_name() -> String {
    "sprite.svg".to_string()
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WatchConfig {
    /// Glob set (relative to the project root) that triggers this binding.
    pub patterns: Vec<String>,

    /// Task to run when a matching file changes.
    pub task: TaskName,

    /// Send a full reload to connected browsers after the task succeeds.
    #[serde(default = "default_true")]
    pub reload: bool,
}

/// Tasks keyed by name, kept in the order they were declared.
///
/// Declaration order is the tie-breaker for the topological sort, so a
/// sorted map would change execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskTable {
    entries: Vec<(TaskName, TaskConfig)>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<TaskName>, task: TaskConfig) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = task,
            None => self.entries.push((name, task)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TaskConfig> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskName, &TaskConfig)> {
        self.entries.iter().map(|(n, t)| (n, t))
    }

    pub fn keys(&self) -> impl Iterator<Item = &TaskName> {
        self.entries.iter().map(|(n, _)| n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for TaskTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TaskTableVisitor;

        impl<'de> Visitor<'de> for TaskTableVisitor {
            type Value = TaskTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of [task.<name>] sections")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = TaskTable::new();
                while let Some((name, task)) = map.next_entry::<TaskName, TaskConfig>()? {
                    table.entries.push((name, task));
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TaskTableVisitor)
    }
}
