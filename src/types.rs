// src/types.rs

//! File-change vocabulary shared by the watcher and the dependency cache.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Creations and modifications are real edits; deletions are not.
    pub fn is_new_change(self) -> bool {
        matches!(self, ChangeKind::Created | ChangeKind::Modified)
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "created" | "create" => Ok(ChangeKind::Created),
            "modified" | "modify" | "write" => Ok(ChangeKind::Modified),
            "deleted" | "delete" | "remove" => Ok(ChangeKind::Deleted),
            other => Err(format!(
                "invalid change kind: {other} (expected \"created\", \"modified\" or \"deleted\")"
            )),
        }
    }
}

/// Classification of a changed path, derived from its name only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    /// `*_test.go`
    Test,
    /// Any other `*.go` file.
    Source,
    /// Module manifest or lock (`go.mod`, `go.sum`, `go.work`, `go.work.sum`).
    Dependency,
    /// Everything else.
    Config,
}

const DEPENDENCY_FILES: &[&str] = &["go.mod", "go.sum", "go.work", "go.work.sum"];

impl FileClass {
    pub fn of(path: &Path) -> Self {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return FileClass::Config,
        };

        if name.ends_with("_test.go") {
            FileClass::Test
        } else if name.ends_with(".go") {
            FileClass::Source
        } else if DEPENDENCY_FILES.contains(&name) {
            FileClass::Dependency
        } else {
            FileClass::Config
        }
    }
}

impl fmt::Display for FileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileClass::Test => "test",
            FileClass::Source => "source",
            FileClass::Dependency => "dependency",
            FileClass::Config => "config",
        };
        f.write_str(s)
    }
}

/// A single file-change notification from the watcher.
///
/// The classification is computed from the path on construction; callers
/// only supply the path and the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    path: PathBuf,
    kind: ChangeKind,
    class: FileClass,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        let path = path.into();
        let class = FileClass::of(&path);
        Self { path, kind, class }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Created)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Modified)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Deleted)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn class(&self) -> FileClass {
        self.class
    }

    pub fn is_new_change(&self) -> bool {
        self.kind.is_new_change()
    }
}
