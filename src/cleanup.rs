//! Scratch directory housekeeping and disposal of shipped backup folders.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, BackupResult};
use crate::types::ARCHIVE_EXTENSION;

const TRACING_TARGET: &str = "backhaul::cleanup";

pub const SCRATCH_DIR_NAME: &str = "temp";

/// Holding area for archives between creation and upload.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Use `path` as scratch space, creating it if needed
    pub fn create(path: impl Into<PathBuf>) -> BackupResult<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove every `.zip` in the scratch directory, whichever run left it.
    ///
    /// Other files and subdirectories are left alone. Returns how many
    /// archives were removed.
    pub fn sweep_archives(&self) -> BackupResult<usize> {
        tracing::info!(
            target: TRACING_TARGET,
            scratch = %self.path.display(),
            "Sweeping archives from scratch directory"
        );

        let mut removed = 0;
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let path = entry.path();

            if !entry.file_type()?.is_file() || !is_archive(&path) {
                continue;
            }

            fs::remove_file(&path)?;
            tracing::debug!(target: TRACING_TARGET, path = %path.display(), "Removed archive");
            removed += 1;
        }

        Ok(removed)
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == ARCHIVE_EXTENSION)
}

/// Somewhere to put a folder so it can still be recovered.
pub trait TrashBin {
    fn discard(&self, path: &Path) -> BackupResult<()>;
}

/// The desktop trash / recycle bin.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrash;

impl TrashBin for SystemTrash {
    fn discard(&self, path: &Path) -> BackupResult<()> {
        trash::delete(path)?;
        Ok(())
    }
}

/// Move the shipped backup folder to the trash rather than deleting it.
pub fn trash_backup_folder(bin: &dyn TrashBin, path: &Path) -> BackupResult<()> {
    tracing::info!(target: TRACING_TARGET, path = %path.display(), "Trashing the backup folder");

    if !path.exists() {
        return Err(BackupError::Trash(format!("{} no longer exists", path.display())));
    }

    bin.discard(path)
}
