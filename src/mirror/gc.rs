use crate::mirror::MirrorError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Lists every non-directory entry below `root`, skipping dot entries
///
/// Symlinks are listed, never followed.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>, MirrorError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|source| MirrorError::Read {
            path: dir.clone(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| MirrorError::Read {
                path: dir.clone(),
                source,
            })?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| MirrorError::Read {
                path: path.clone(),
                source,
            })?;
            if file_type.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Deletes every file below `root` that is not in `seen`
///
/// Returns the deleted paths. A file that cannot be deleted is logged and
/// left in place.
pub fn collect_garbage(root: &Path, seen: &HashSet<PathBuf>) -> Result<Vec<PathBuf>, MirrorError> {
    let mut deleted = Vec::new();

    for path in walk_files(root)? {
        if seen.contains(&path) {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("File {} does not exist anymore, deleted", path.display());
                deleted.push(path);
            }
            Err(e) => {
                tracing::warn!("Could not delete stale file {}: {}", path.display(), e);
            }
        }
    }

    Ok(deleted)
}
