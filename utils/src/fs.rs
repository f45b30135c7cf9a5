//! Storage-directory helpers.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Create `path` and any missing parents.
pub fn ensure_path(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
}

/// Remove `path` and everything beneath it. A missing path is not an error.
pub fn delete_recursively(path: &Path) -> io::Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Delete every direct child of `storage_path` that is not listed in `exempt`.
///
/// Returns the paths that were removed. Individual failures are logged and
/// skipped so one locked directory does not keep the rest around.
pub fn wipe_all_except(storage_path: &Path, exempt: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(storage_path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut removed = Vec::new();
    for entry in entries {
        let child = entry?.path();
        if exempt.iter().any(|p| p == &child) {
            debug!(path = %child.display(), "wipe: exempt");
            continue;
        }
        match delete_recursively(&child) {
            Ok(()) => removed.push(child),
            Err(e) => warn!(path = %child.display(), error = %e, "wipe: failed to delete"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_path(&nested).unwrap();
        std::fs::write(nested.join("file"), b"x").unwrap();
        assert!(nested.exists());

        delete_recursively(&dir.path().join("a")).unwrap();
        assert!(!dir.path().join("a").exists());
        // second delete is a no-op
        delete_recursively(&dir.path().join("a")).unwrap();
    }

    #[test]
    fn wipe_all_keeps_exempt_children() {
        let dir = tempfile::tempdir().unwrap();
        let keep = dir.path().join("keep");
        let drop1 = dir.path().join("drop1");
        let drop2 = dir.path().join("drop2.txt");
        ensure_path(&keep).unwrap();
        ensure_path(&drop1).unwrap();
        std::fs::write(&drop2, b"x").unwrap();

        let removed = wipe_all_except(dir.path(), &[keep.clone()]).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(keep.exists());
        assert!(!drop1.exists());
        assert!(!drop2.exists());
    }

    #[test]
    fn wipe_all_on_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let removed = wipe_all_except(&dir.path().join("missing"), &[]).unwrap();
        assert!(removed.is_empty());
    }
}
