// tests/config_loading.rs

use std::error::Error;
use std::fs;
use std::time::Duration;

use sentinel::config::{SentinelConfig, load_and_validate, load_or_default};
use sentinel::errors::SentinelError;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn full_file_is_loaded_and_typed() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Sentinel.toml");
    fs::write(
        &path,
        r#"
[executor]
program = "/usr/local/go/bin/go"
verbose = true
timeout = "2m"
args = ["-count=1"]

[executor.env]
GOFLAGS = "-mod=mod"

[scheduler]
concurrency = 8
timeout = "90s"

[cache]
recency_window = "5m"

[watch]
ignore = ["tmp/**"]
debounce = "100ms"
"#,
    )?;

    let config = load_and_validate(&path)?;
    assert_eq!(config.tool.program, "/usr/local/go/bin/go");
    assert!(config.options.verbose);
    assert!(config.options.json_output);
    assert_eq!(config.options.timeout, Some(Duration::from_secs(120)));
    assert_eq!(config.options.args, vec!["-count=1"]);
    assert_eq!(config.options.env.get("GOFLAGS").map(String::as_str), Some("-mod=mod"));
    assert_eq!(config.concurrency, 8);
    assert_eq!(config.unit_timeout, Some(Duration::from_secs(90)));
    assert_eq!(config.recency_window, Duration::from_secs(300));
    assert_eq!(config.watch.ignore, vec!["tmp/**"]);
    assert_eq!(config.watch.debounce, Duration::from_millis(100));
    Ok(())
}

#[test]
fn missing_file_yields_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = load_or_default(dir.path().join("Sentinel.toml"))?;
    assert_eq!(config, SentinelConfig::default());
    Ok(())
}

#[test]
fn empty_file_matches_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Sentinel.toml");
    fs::write(&path, "")?;
    assert_eq!(load_and_validate(&path)?, SentinelConfig::default());
    Ok(())
}

#[test]
fn invalid_values_are_config_errors() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Sentinel.toml");

    for body in [
        "[scheduler]\nconcurrency = 0\n",
        "[executor]\nprogram = \"\"\n",
        "[cache]\nrecency_window = \"soon\"\n",
        "[watch]\nignore = [\"a/[\"]\n",
    ] {
        fs::write(&path, body)?;
        let err = load_and_validate(&path).unwrap_err();
        assert!(matches!(err, SentinelError::ConfigError(_)), "{body}: {err}");
    }
    Ok(())
}

#[test]
fn malformed_toml_is_reported() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Sentinel.toml");
    fs::write(&path, "[scheduler\nconcurrency = ")?;
    assert!(load_and_validate(&path).is_err());
    Ok(())
}
