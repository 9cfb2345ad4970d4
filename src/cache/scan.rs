// src/cache/scan.rs

//! Which files a target depends on, and their modification times.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::fs::FileSystem;

use super::EVERYTHING;

/// Module files that affect every target when present at the root.
const MODULE_FILES: &[&str] = &["go.mod", "go.sum"];

/// Directories never descended into by a recursive scan.
const SKIP_DIRS: &[&str] = &["vendor", "testdata", "node_modules"];

/// Map a target to its dependency set:
///
/// - `./...` (or `dir/...`): every `.go` file below that directory
/// - a directory: the `.go` files directly in it
/// - a file: the file plus the `.go` files next to it
///
/// plus `go.mod`/`go.sum` at `root`. Files whose mtime cannot be read are
/// left out.
pub(crate) fn scan_dependencies(fs: &dyn FileSystem, root: &Path, target: &str) -> BTreeMap<PathBuf, SystemTime> {
    let mut files = Vec::new();

    if let Some(prefix) = recursive_prefix(target) {
        walk_go_files(fs, &resolve(root, Path::new(prefix)), &mut files);
    } else {
        let path = resolve(root, Path::new(target));
        if fs.is_dir(&path) {
            go_files_in(fs, &path, &mut files);
        } else {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).map(Path::to_path_buf);
            files.push(path);
            go_files_in(fs, &dir.unwrap_or_else(|| root.to_path_buf()), &mut files);
        }
    }

    for name in MODULE_FILES {
        let path = resolve(root, Path::new(name));
        if fs.is_file(&path) {
            files.push(path);
        }
    }

    let mut deps = BTreeMap::new();
    for file in files {
        match fs.modified(&file) {
            Ok(mtime) => {
                deps.insert(file, mtime);
            }
            Err(err) => debug!(file = %file.display(), error = %err, "skipping unreadable dependency"),
        }
    }
    deps
}

/// Join `path` onto `root`, leaving absolute paths and a `.` root alone so
/// paths stay in the same shape the watcher reports them.
pub(crate) fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || root == Path::new(".") || root.as_os_str().is_empty() {
        path.to_path_buf()
    } else if path == Path::new(".") {
        root.to_path_buf()
    } else {
        root.join(path)
    }
}

fn recursive_prefix(target: &str) -> Option<&str> {
    if target == EVERYTHING {
        return Some(".");
    }
    let prefix = target.strip_suffix("/...")?;
    Some(prefix.strip_prefix("./").unwrap_or(prefix))
}

fn go_files_in(fs: &dyn FileSystem, dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs.read_dir(dir) else {
        return;
    };
    out.extend(entries.into_iter().filter(|p| is_go_file(p) && fs.is_file(p)));
}

fn walk_go_files(fs: &dyn FileSystem, dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs.read_dir(dir) else {
        return;
    };

    for entry in entries {
        if fs.is_dir(&entry) {
            if !is_skipped_dir(&entry) {
                walk_go_files(fs, &entry, out);
            }
        } else if is_go_file(&entry) {
            out.push(entry);
        }
    }
}

fn is_go_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "go")
}

fn is_skipped_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with('.') || SKIP_DIRS.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn project() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("go.mod");
        fs.add_file("main.go");
        fs.add_file("pkg/foo.go");
        fs.add_file("pkg/foo_test.go");
        fs.add_file("pkg/README.md");
        fs.add_file("pkg/inner/deep.go");
        fs.add_file("vendor/dep/dep.go");
        fs.add_file(".git/hooks/x.go");
        fs
    }

    fn names(deps: &BTreeMap<PathBuf, SystemTime>) -> Vec<String> {
        deps.keys().map(|p| p.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn directory_target_covers_its_go_files_and_module_files() {
        let fs = project();
        let deps = scan_dependencies(&fs, Path::new("."), "pkg");
        assert_eq!(names(&deps), vec!["go.mod", "pkg/foo.go", "pkg/foo_test.go"]);
    }

    #[test]
    fn file_target_includes_its_siblings() {
        let fs = project();
        let deps = scan_dependencies(&fs, Path::new("."), "pkg/foo_test.go");
        assert_eq!(names(&deps), vec!["go.mod", "pkg/foo.go", "pkg/foo_test.go"]);
    }

    #[test]
    fn everything_walks_but_skips_vendor_and_hidden() {
        let fs = project();
        let deps = scan_dependencies(&fs, Path::new("."), EVERYTHING);
        assert_eq!(
            names(&deps),
            vec!["go.mod", "main.go", "pkg/foo.go", "pkg/foo_test.go", "pkg/inner/deep.go"]
        );
    }

    #[test]
    fn resolve_keeps_dot_root_paths_relative() {
        assert_eq!(resolve(Path::new("."), Path::new("pkg")), PathBuf::from("pkg"));
        assert_eq!(resolve(Path::new("/p"), Path::new("pkg")), PathBuf::from("/p/pkg"));
        assert_eq!(resolve(Path::new("/p"), Path::new(".")), PathBuf::from("/p"));
    }
}
