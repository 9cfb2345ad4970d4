// src/exec/args.rs

use std::path::Path;

use crate::model::ExecutionOptions;
use crate::parse::format_go_duration;

/// The external tool and the subcommands the executor drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub test_subcommand: String,
    pub list_subcommand: String,
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            test_subcommand: "test".to_string(),
            list_subcommand: "list".to_string(),
        }
    }
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }
}

/// Build the argument vector for one test invocation.
///
/// Flag order is fixed so identical options always produce identical
/// command lines: subcommand, `-json`, `-v`, `-cover`, `-coverprofile=`,
/// `-parallel=`, `-timeout=`, extra args, then the targets.
pub fn build_test_args(tool: &ToolCommand, options: &ExecutionOptions, targets: &[String]) -> Vec<String> {
    let mut args = vec![tool.test_subcommand.clone()];

    if options.json_output {
        args.push("-json".to_string());
    }
    if options.verbose {
        args.push("-v".to_string());
    }
    if options.coverage {
        args.push("-cover".to_string());
    }
    if let Some(profile) = &options.coverage_profile {
        args.push(format!("-coverprofile={}", profile.display()));
    }
    if let Some(parallel) = options.parallel.filter(|p| *p > 0) {
        args.push(format!("-parallel={parallel}"));
    }
    if let Some(timeout) = options.timeout.filter(|t| !t.is_zero()) {
        args.push(format!("-timeout={}", format_go_duration(timeout)));
    }

    args.extend(options.args.iter().cloned());

    let base = options.working_directory.as_deref();
    args.extend(targets.iter().map(|t| package_arg(t, base)));
    args
}

/// Render a target the way the tool expects it on the command line.
///
/// Relative paths that exist under the working directory get a `./`
/// prefix so the tool does not mistake `pkg` for an import path. Import
/// paths, patterns and already-anchored paths pass through unchanged.
pub fn package_arg(target: &str, working_dir: Option<&Path>) -> String {
    if target.starts_with('.') || Path::new(target).is_absolute() {
        return target.to_string();
    }

    let base = working_dir.unwrap_or(Path::new("."));
    if base.join(target).exists() {
        format!("./{target}")
    } else {
        target.to_string()
    }
}
