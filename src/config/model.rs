// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::DEFAULT_RECENCY_WINDOW;
use crate::exec::ToolCommand;
use crate::model::ExecutionOptions;
use crate::scheduler::DEFAULT_CONCURRENCY;
use crate::watch::{DEFAULT_DEBOUNCE, DEFAULT_IGNORES};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [executor]
/// program = "go"
/// json = true
/// timeout = "10m"
///
/// [executor.env]
/// GOFLAGS = "-count=1"
///
/// [scheduler]
/// concurrency = 4
///
/// [cache]
/// recency_window = "1m"
///
/// [watch]
/// ignore = [".git/**", "vendor/**"]
/// debounce = "250ms"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub watch: WatchSection,
}

/// `[executor]`: how the test tool is invoked.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default)]
    pub verbose: bool,

    /// Ask the tool for its JSON event stream.
    #[serde(default = "default_true")]
    pub json: bool,

    #[serde(default)]
    pub coverage: bool,

    pub coverage_profile: Option<PathBuf>,

    /// Passed to the tool as `-timeout`, e.g. `"10m"`.
    pub timeout: Option<String>,

    pub parallel: Option<usize>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    pub working_directory: Option<PathBuf>,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            verbose: false,
            json: true,
            coverage: false,
            coverage_profile: None,
            timeout: None,
            parallel: None,
            args: Vec::new(),
            env: BTreeMap::new(),
            working_directory: None,
        }
    }
}

/// `[scheduler]`
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-unit timeout when `[executor].timeout` is unset.
    pub timeout: Option<String>,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout: None,
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSection {
    /// How long a successful run stays trusted, e.g. `"1m"`.
    pub recency_window: Option<String>,
}

/// `[watch]`
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    #[serde(default = "default_ignores")]
    pub ignore: Vec<String>,

    pub debounce: Option<String>,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            ignore: default_ignores(),
            debounce: None,
        }
    }
}

fn default_program() -> String {
    "go".to_string()
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_ignores() -> Vec<String> {
    DEFAULT_IGNORES.iter().map(|s| s.to_string()).collect()
}

/// Validated watcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    pub ignore: Vec<String>,
    pub debounce: Duration,
}

/// Validated configuration. Construct via `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelConfig {
    pub tool: ToolCommand,
    pub options: ExecutionOptions,
    pub concurrency: usize,
    pub unit_timeout: Option<Duration>,
    pub recency_window: Duration,
    pub watch: WatchSettings,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            tool: ToolCommand::default(),
            options: ExecutionOptions {
                json_output: true,
                ..ExecutionOptions::default()
            },
            concurrency: DEFAULT_CONCURRENCY,
            unit_timeout: None,
            recency_window: DEFAULT_RECENCY_WINDOW,
            watch: WatchSettings {
                ignore: default_ignores(),
                debounce: DEFAULT_DEBOUNCE,
            },
        }
    }
}
