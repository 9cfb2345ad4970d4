// src/config/validate.rs

use std::time::Duration;

use crate::cache::DEFAULT_RECENCY_WINDOW;
use crate::config::model::{RawConfigFile, SentinelConfig, WatchSettings};
use crate::errors::{Result, SentinelError};
use crate::exec::ToolCommand;
use crate::model::ExecutionOptions;
use crate::parse::parse_duration_strict;
use crate::watch::{DEFAULT_DEBOUNCE, IgnoreSet};

impl TryFrom<RawConfigFile> for SentinelConfig {
    type Error = SentinelError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_executor(&raw)?;
        validate_scheduler(&raw)?;
        validate_watch(&raw)?;

        let exec = raw.executor;
        let options = ExecutionOptions {
            verbose: exec.verbose,
            json_output: exec.json,
            coverage: exec.coverage,
            coverage_profile: exec.coverage_profile,
            timeout: optional_duration("executor.timeout", exec.timeout.as_deref())?,
            parallel: exec.parallel,
            args: exec.args,
            env: exec.env,
            working_directory: exec.working_directory,
        };

        Ok(SentinelConfig {
            tool: ToolCommand::new(exec.program),
            options,
            concurrency: raw.scheduler.concurrency,
            unit_timeout: optional_duration("scheduler.timeout", raw.scheduler.timeout.as_deref())?,
            recency_window: optional_duration("cache.recency_window", raw.cache.recency_window.as_deref())?
                .unwrap_or(DEFAULT_RECENCY_WINDOW),
            watch: WatchSettings {
                ignore: raw.watch.ignore,
                debounce: optional_duration("watch.debounce", raw.watch.debounce.as_deref())?
                    .unwrap_or(DEFAULT_DEBOUNCE),
            },
        })
    }
}

fn validate_executor(cfg: &RawConfigFile) -> Result<()> {
    if cfg.executor.program.trim().is_empty() {
        return Err(SentinelError::ConfigError(
            "[executor].program must not be empty".to_string(),
        ));
    }
    if cfg.executor.parallel == Some(0) {
        return Err(SentinelError::ConfigError(
            "[executor].parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.concurrency == 0 {
        return Err(SentinelError::ConfigError(
            "[scheduler].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    IgnoreSet::new(&cfg.watch.ignore)
        .map_err(|err| SentinelError::ConfigError(format!("[watch].ignore: {err:#}")))?;
    Ok(())
}

fn optional_duration(key: &str, value: Option<&str>) -> Result<Option<Duration>> {
    value
        .map(|text| {
            parse_duration_strict(text).ok_or_else(|| {
                SentinelError::ConfigError(format!(
                    "{key}: invalid duration {text:?} (expected e.g. \"30s\", \"250ms\", \"1m\")"
                ))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<SentinelConfig> {
        let raw: RawConfigFile = toml::from_str(text)?;
        SentinelConfig::try_from(raw)
    }

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(parse("").unwrap(), SentinelConfig::default());
    }

    #[test]
    fn durations_are_parsed() {
        let cfg = parse(
            r#"
            [executor]
            timeout = "1m30s"
            [cache]
            recency_window = "10s"
            [watch]
            debounce = "50ms"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.options.timeout, Some(Duration::from_secs(90)));
        assert_eq!(cfg.recency_window, Duration::from_secs(10));
        assert_eq!(cfg.watch.debounce, Duration::from_millis(50));
    }

    #[test]
    fn bad_duration_is_a_config_error() {
        let err = parse("[executor]\ntimeout = \"soon\"\n").unwrap_err();
        assert!(matches!(err, SentinelError::ConfigError(msg) if msg.contains("executor.timeout")));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(matches!(
            parse("[scheduler]\nconcurrency = 0\n"),
            Err(SentinelError::ConfigError(_))
        ));
    }

    #[test]
    fn bad_ignore_glob_is_rejected() {
        assert!(matches!(
            parse("[watch]\nignore = [\"a/[b\"]\n"),
            Err(SentinelError::ConfigError(_))
        ));
    }
}
