use std::path::PathBuf;

use thiserror::Error;

pub type BackupResult<T> = Result<T, BackupError>;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("No backup folders found in {}", .0.display())]
    NoCandidates(PathBuf),

    #[error("Cannot read directory {}: {source}", path.display())]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Verification failed for {key}: expected {expected}, found {actual}")]
    Verification {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Trash error: {0}")]
    Trash(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    pub fn directory_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryAccess {
            path: path.into(),
            source,
        }
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<zip::result::ZipError> for BackupError {
    fn from(err: zip::result::ZipError) -> Self {
        BackupError::Archive(err.to_string())
    }
}

impl From<opendal::Error> for BackupError {
    fn from(err: opendal::Error) -> Self {
        use opendal::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound => BackupError::Upload(format!("bucket or object not found: {err}")),
            ErrorKind::PermissionDenied => BackupError::Upload(format!("permission denied: {err}")),
            _ => BackupError::Upload(err.to_string()),
        }
    }
}

impl From<trash::Error> for BackupError {
    fn from(err: trash::Error) -> Self {
        BackupError::Trash(err.to_string())
    }
}
