//! Path-containment filter for tar entries.
//!
//! Kept as a pure function over paths so it is unit-testable without
//! touching a filesystem.

use std::path::{Component, Path, PathBuf};

/// Returns the normalized, archive-root-relative path if `path` is safe to
/// extract: relative, and never escaping above the archive root via `..`.
/// Absolute paths and any entry whose normalized path would climb above
/// the root are rejected.
pub fn sanitize_entry_path(path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return None;
    }

    let mut normalized = PathBuf::new();
    let mut depth: i64 = 0;
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                normalized.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
                normalized.pop();
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if normalized.as_os_str().is_empty() {
        return None;
    }

    Some(normalized)
}
