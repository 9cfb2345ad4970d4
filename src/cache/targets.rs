// src/cache/targets.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::fs::FileSystem;
use crate::types::{ChangeEvent, FileClass};

use super::EVERYTHING;
use super::scan::resolve;

/// See [`DependencyCache::determine_targets`](super::DependencyCache::determine_targets).
///
/// - test file: its package directory
/// - source file: its related test files, or its directory if it has none
/// - module manifest or anything unrecognised: every package
pub(crate) fn determine_targets(fs: &dyn FileSystem, root: &Path, changes: &[ChangeEvent]) -> Vec<String> {
    let mut targets = BTreeSet::new();

    for change in changes {
        match change.class() {
            FileClass::Test => {
                targets.insert(display(&package_dir(change.path())));
            }
            FileClass::Source => {
                let related = related_test_files(fs, root, change.path());
                if related.is_empty() {
                    targets.insert(display(&package_dir(change.path())));
                } else {
                    targets.extend(related.iter().map(|p| display(p)));
                }
            }
            FileClass::Dependency | FileClass::Config => {
                targets.insert(EVERYTHING.to_string());
            }
        }
    }

    debug!(changes = changes.len(), ?targets, "determined targets");
    targets.into_iter().collect()
}

/// `<stem>_test.go` and `<stem>_*_test.go` next to a source file.
fn related_test_files(fs: &dyn FileSystem, root: &Path, source: &Path) -> Vec<PathBuf> {
    let Some(stem) = source.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    let dir = package_dir(source);
    let exact = format!("{stem}_test.go");
    let prefix = format!("{stem}_");

    let Ok(entries) = fs.read_dir(&resolve(root, &dir)) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| entry.file_name().and_then(|n| n.to_str()))
        .filter(|name| *name == exact || (name.starts_with(&prefix) && name.ends_with("_test.go")))
        .map(|name| relative_to(&dir, name))
        .collect()
}

fn package_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn relative_to(dir: &Path, name: &str) -> PathBuf {
    if dir == Path::new(".") {
        PathBuf::from(name)
    } else {
        dir.join(name)
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
