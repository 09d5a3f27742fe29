//! Bucket access for shipped archives.

use bytes::BytesMut;
use opendal::{Operator, services};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::config::{Credentials, WasabiConfig};
use crate::error::{BackupError, BackupResult};
use crate::types::BackupName;

const TRACING_TARGET: &str = "backhaul::storage";

/// Bodies are pushed in parts no smaller than this (S3 requires >= 5 MiB).
const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// `<machine_name>/<backup_name>.zip`
pub fn object_key(machine_name: &str, backup_name: &BackupName) -> String {
    format!("{}/{}", machine_name.trim_matches('/'), backup_name.file_name())
}

/// Handle on the archive bucket.
#[derive(Clone)]
pub struct ArchiveStore {
    operator: Operator,
    bucket: String,
}

impl ArchiveStore {
    /// Build an S3 client for the configured endpoint and bucket.
    pub fn connect(config: &WasabiConfig, credentials: &Credentials) -> BackupResult<Self> {
        let builder = services::S3::default()
            .endpoint(&config.bucket_endpoint)
            .bucket(&config.archive_bucket_name)
            .region(&config.region)
            .access_key_id(&credentials.access_key_id)
            .secret_access_key(&credentials.secret_key);

        let operator = Operator::new(builder)
            .map(|op| op.finish())
            .map_err(|e| BackupError::config(format!("cannot create bucket client: {}", e)))?;

        tracing::debug!(
            target: TRACING_TARGET,
            endpoint = %config.bucket_endpoint,
            bucket = %config.archive_bucket_name,
            "Bucket client initialized"
        );

        Ok(Self::from_operator(operator, config.archive_bucket_name.clone()))
    }

    pub fn from_operator(operator: Operator, bucket: impl Into<String>) -> Self {
        Self {
            operator,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Stream a local file to `key`, replacing whatever is there.
    pub async fn upload(&self, local_path: &Path, key: &str) -> BackupResult<u64> {
        tracing::info!(
            target: TRACING_TARGET,
            bucket = %self.bucket,
            key = %key,
            "Attempting to upload archive"
        );

        let mut file = tokio::fs::File::open(local_path)
            .await
            .map_err(|e| BackupError::upload(format!("cannot open {}: {}", local_path.display(), e)))?;

        let mut writer = self
            .operator
            .writer_with(key)
            .chunk(UPLOAD_CHUNK_SIZE)
            .await?;

        let mut buf = BytesMut::with_capacity(UPLOAD_CHUNK_SIZE);
        let mut sent = 0u64;
        loop {
            buf.reserve(UPLOAD_CHUNK_SIZE);
            let read = file
                .read_buf(&mut buf)
                .await
                .map_err(|e| BackupError::upload(format!("cannot read {}: {}", local_path.display(), e)))?;
            if read == 0 {
                break;
            }
            writer.write(buf.split().freeze()).await?;
            sent += read as u64;
        }
        writer.close().await?;

        tracing::info!(
            target: TRACING_TARGET,
            bucket = %self.bucket,
            key = %key,
            size = sent,
            "Upload complete"
        );

        Ok(sent)
    }

    /// Compare the stored object with the local archive.
    ///
    /// The size is always checked; the digest only when `expected_sha256` is
    /// given, which streams the whole object back one range at a time.
    pub async fn verify(
        &self,
        key: &str,
        expected_size: u64,
        expected_sha256: Option<&str>,
    ) -> BackupResult<()> {
        let meta = self.operator.stat(key).await?;
        if meta.content_length() != expected_size {
            return Err(BackupError::Verification {
                key: key.to_string(),
                expected: format!("{} bytes", expected_size),
                actual: format!("{} bytes", meta.content_length()),
            });
        }

        if let Some(expected) = expected_sha256 {
            let actual = self.remote_sha256(key, expected_size).await?;
            if actual != expected {
                return Err(BackupError::Verification {
                    key: key.to_string(),
                    expected: format!("sha256 {}", expected),
                    actual: format!("sha256 {}", actual),
                });
            }
        }

        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            digest_checked = expected_sha256.is_some(),
            "Remote object verified"
        );

        Ok(())
    }

    /// Hash the stored object one range at a time
    async fn remote_sha256(&self, key: &str, size: u64) -> BackupResult<String> {
        let reader = self.operator.reader(key).await?;
        let mut hasher = Sha256::new();

        let mut offset = 0u64;
        while offset < size {
            let end = size.min(offset + UPLOAD_CHUNK_SIZE as u64);
            for chunk in reader.read(offset..end).await? {
                hasher.update(&chunk);
            }
            offset = end;
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

impl std::fmt::Debug for ArchiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveStore")
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Hex SHA-256 of a local file
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
