// src/watch/path_utils.rs

//! Path handling for watch events.

use std::path::Path;

/// Convert `path` into a `/`-separated string relative to `base`.
///
/// - First we try a direct `strip_prefix(base)`.
/// - If that fails (symlinks, `/private/var` vs `/var` on macOS) we
///   canonicalize both and try again. Deleted files cannot be canonicalized,
///   so their parent is canonicalized instead.
///
/// Returns `None` for paths outside `base` and for `base` itself.
pub fn relative_str(base: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(base) {
        return non_empty(rel);
    }

    let base_canon = base.canonicalize().ok()?;
    let path_canon = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => {
            let parent = path.parent()?.canonicalize().ok()?;
            parent.join(path.file_name()?)
        }
    };

    path_canon.strip_prefix(&base_canon).ok().and_then(non_empty)
}

fn non_empty(rel: &Path) -> Option<String> {
    let s = rel.to_string_lossy().replace('\\', "/");
    if s.is_empty() { None } else { Some(s) }
}
