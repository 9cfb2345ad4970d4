// src/exec/backend.rs

//! Pluggable runner abstraction for the parallel scheduler.
//!
//! The scheduler talks to a `PackageRunner` instead of an [`Executor`]
//! directly, so tests can substitute a fake that never spawns processes.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::errors::{Result, SentinelError};
use crate::model::{ExecutionOptions, TestSuite};

use super::args::ToolCommand;
use super::executor::Executor;

/// Runs one execution unit to completion.
///
/// Test failures are reported inside the returned suite; `Err` means the
/// unit itself could not produce results.
pub trait PackageRunner: Send + Sync {
    fn run_target<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        target: &'a str,
        options: &'a ExecutionOptions,
    ) -> Pin<Box<dyn Future<Output = Result<TestSuite>> + Send + 'a>>;
}

/// Production runner: a fresh [`Executor`] per unit, so units never trip
/// each other's single-flight guard.
#[derive(Debug, Clone, Default)]
pub struct ExecutorRunner {
    tool: ToolCommand,
}

impl ExecutorRunner {
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }
}

impl PackageRunner for ExecutorRunner {
    fn run_target<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        target: &'a str,
        options: &'a ExecutionOptions,
    ) -> Pin<Box<dyn Future<Output = Result<TestSuite>> + Send + 'a>> {
        Box::pin(async move {
            let executor = Executor::with_tool(self.tool.clone());
            let pkg = executor.execute_package(cancel, target, options).await?;

            match &pkg.error {
                Some(failure) => Err(SentinelError::PackageFailed {
                    package: pkg.package.clone(),
                    failure: failure.clone(),
                }),
                None => Ok(TestSuite::from_package(target, &pkg)),
            }
        })
    }
}
