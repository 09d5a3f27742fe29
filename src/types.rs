use chrono::{DateTime, Local};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

pub const BACKUP_PREFIX: &str = "backup";
pub const ARCHIVE_EXTENSION: &str = "zip";

/// A direct child directory of the backup root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupCandidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Base name shared by the scratch archive and the object key, e.g. `backup_20120515-155045`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupName(String);

impl BackupName {
    pub fn now() -> Self {
        Self::at(Local::now())
    }

    pub fn at(time: DateTime<Local>) -> Self {
        Self(format!("{}_{}", BACKUP_PREFIX, time.format("%Y%m%d-%H%M%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, ARCHIVE_EXTENSION)
    }
}

impl fmt::Display for BackupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of zipping a backup folder
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub file_count: usize,
    pub size: u64,
}

/// What a successful run did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source: PathBuf,
    pub key: String,
    pub size: u64,
    pub sha256: String,
    pub trashed: bool,
}
