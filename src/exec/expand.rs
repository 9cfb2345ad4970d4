// src/exec/expand.rs

//! Resolving `...` wildcard targets into concrete packages via the tool's
//! list subcommand.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{Result, SentinelError};
use crate::model::ExecutionOptions;

use super::args::{ToolCommand, package_arg};
use super::process::{self, SpawnRequest};

pub fn is_pattern(target: &str) -> bool {
    target.contains("...")
}

/// Expand every wildcard target in `targets`, keeping order.
///
/// Concrete targets pass through untouched. A package reached by more than
/// one target is only listed once.
pub async fn expand_targets(
    tool: &ToolCommand,
    cancel: &CancellationToken,
    targets: &[String],
    options: &ExecutionOptions,
) -> Result<Vec<String>> {
    let mut packages: Vec<String> = Vec::with_capacity(targets.len());

    for target in targets {
        let expanded = if is_pattern(target) {
            list_packages(tool, cancel, target, options).await?
        } else {
            vec![target.clone()]
        };

        for pkg in expanded {
            if !packages.contains(&pkg) {
                packages.push(pkg);
            }
        }
    }

    Ok(packages)
}

async fn list_packages(
    tool: &ToolCommand,
    cancel: &CancellationToken,
    pattern: &str,
    options: &ExecutionOptions,
) -> Result<Vec<String>> {
    let args = vec![
        tool.list_subcommand.clone(),
        package_arg(pattern, options.working_directory.as_deref()),
    ];
    let handle = process::spawn(SpawnRequest {
        program: &tool.program,
        args: &args,
        working_dir: options.working_directory.as_deref(),
        env: &options.env,
    })?;

    let out = handle.wait_with_output(cancel, None).await?;
    if !out.status.success() {
        return Err(SentinelError::PatternExpansion {
            pattern: pattern.to_string(),
            reason: first_line(&out.output)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} exited with {}", tool.program, out.status)),
        });
    }

    let packages: Vec<String> = out
        .output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if packages.is_empty() {
        return Err(SentinelError::PatternExpansion {
            pattern: pattern.to_string(),
            reason: "matched no packages".to_string(),
        });
    }

    debug!(pattern, count = packages.len(), "expanded package pattern");
    Ok(packages)
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}
