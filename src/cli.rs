// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `sentinel`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sentinel",
    version,
    about = "Run Go tests in parallel, re-running only what file changes affect.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). A missing file means defaults.
    #[arg(long, value_name = "PATH", default_value = "Sentinel.toml")]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SENTINEL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Maximum number of packages tested at once.
    #[arg(long, short = 'j', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Keep running and re-test affected packages on file changes.
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Ask the test tool for its JSON event stream.
    #[arg(long)]
    pub json: bool,

    /// Pass `-v` to the test tool.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Packages or patterns to test.
    #[arg(value_name = "TARGET", default_value = "./...")]
    pub targets: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
