// src/watch/ignore.rs

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Paths the watcher never reports.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git/**",
    "vendor/**",
    "**/testdata/**",
    "node_modules/**",
    "**/*.swp",
    "**/*.swx",
    "**/*~",
    "**/.#*",
];

/// Compiled ignore globs, matched against root-relative `/`-separated
/// paths.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnoreSet {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).with_context(|| format!("invalid ignore pattern {pattern:?}"))?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }

        let set = builder.build().context("building ignore glob set")?;
        Ok(Self { patterns: kept, set })
    }

    pub fn defaults() -> Self {
        // The built-in patterns are known to compile.
        Self::new(DEFAULT_IGNORES).unwrap_or_else(|_| Self::empty())
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_ignored(&self, relative: &str) -> bool {
        self.set.is_match(relative)
    }
}

impl Default for IgnoreSet {
    fn default() -> Self {
        Self::defaults()
    }
}
