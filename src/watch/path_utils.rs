// src/watch/path_utils.rs

use std::path::Path;

/// `path` relative to `root` with forward slashes, or `None` if it is not
/// under `root`.
///
/// Falls back to comparing canonical forms, since notify may report a
/// different absolute prefix for the same directory (symlinks,
/// `/private/var` on macOS).
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let (root_canon, path_canon) = (root.canonicalize().ok()?, path.canonicalize().ok()?);
    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}
