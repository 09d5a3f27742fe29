//! Finds the folder to ship: the most recently modified child of the backup root.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{BackupError, BackupResult};
use crate::types::BackupCandidate;

const TRACING_TARGET: &str = "backhaul::locator";

/// Pick the newest folder directly under `root`.
///
/// Only immediate subdirectories count; files are ignored and nothing is
/// walked recursively. Symlinks are followed, dangling ones are skipped.
pub fn find_backup_folder(root: &Path) -> BackupResult<BackupCandidate> {
    let candidates = list_candidates(root)?;

    tracing::debug!(
        target: TRACING_TARGET,
        root = %root.display(),
        count = candidates.len(),
        "Scanned backup root"
    );

    latest_modified(candidates).ok_or_else(|| BackupError::NoCandidates(root.to_path_buf()))
}

/// Newest candidate; equal timestamps go to the lexicographically greatest name.
pub fn latest_modified(candidates: Vec<BackupCandidate>) -> Option<BackupCandidate> {
    candidates.into_iter().max_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
    })
}

fn list_candidates(root: &Path) -> BackupResult<Vec<BackupCandidate>> {
    let entries = fs::read_dir(root).map_err(|e| BackupError::directory_access(root, e))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BackupError::directory_access(root, e))?;
        let path = entry.path();

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(BackupError::directory_access(&path, e)),
        };

        if !metadata.is_dir() {
            continue;
        }

        let modified = metadata
            .modified()
            .map_err(|e| BackupError::directory_access(&path, e))?;

        candidates.push(BackupCandidate { path, modified });
    }

    Ok(candidates)
}
