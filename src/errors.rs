// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! The variants follow the failure taxonomy the executor, cache and
//! scheduler share. Test failures are *not* errors; they live in
//! `ExecutionResult::success` and per-test statuses.

use std::time::Duration;

use thiserror::Error;

use crate::model::PackageFailure;

#[derive(Error, Debug)]
pub enum SentinelError {
    /// A second execution was attempted while one is in flight.
    #[error("executor is already running")]
    Busy,

    /// `cancel()` was called with nothing in flight.
    #[error("no test execution is currently running")]
    NotRunning,

    /// A target pattern could not be resolved to concrete packages.
    #[error("failed to expand package pattern {pattern}: {reason}")]
    PatternExpansion { pattern: String, reason: String },

    /// The subprocess could not be started at all.
    #[error("failed to start {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A package could not be built or run; reported by callers that turn
    /// a [`PackageResult`](crate::model::PackageResult) into a unit outcome.
    #[error("package {package} failed: {failure}")]
    PackageFailed {
        package: String,
        failure: PackageFailure,
    },

    /// The caller (or a parent token) cancelled the execution.
    #[error("test execution cancelled")]
    Cancelled,

    /// The hard deadline elapsed and the process group was killed.
    #[error("test execution timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SentinelError {
    /// `true` when the run was stopped rather than genuinely failing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SentinelError::Cancelled | SentinelError::TimedOut(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SentinelError>;
