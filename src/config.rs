use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{BackupError, BackupResult};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_CREDENTIALS_PATH: &str = "secrets/wasabi_credentials.toml";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub machine: MachineConfig,
    pub wasabi: WasabiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Used as the first segment of every object key
    pub name: String,
    /// Parent of the backup folders; its newest child gets shipped
    pub backup_folder_path: PathBuf,
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasabiConfig {
    pub bucket_endpoint: String,
    pub archive_bucket_name: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Config {
    /// Load configuration
    pub fn load(path: &Path) -> BackupResult<Self> {
        let config_data = read_file(path)?;
        Self::parse(&config_data).map_err(|e| match e {
            BackupError::Config(msg) => BackupError::config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn parse(data: &str) -> BackupResult<Self> {
        let config: Config = toml::from_str(data).map_err(|e| BackupError::config(e.to_string()))?;

        if config.machine.name.trim().is_empty() {
            return Err(BackupError::config("machine.name must not be empty"));
        }
        if config.wasabi.archive_bucket_name.trim().is_empty() {
            return Err(BackupError::config("wasabi.archive_bucket_name must not be empty"));
        }

        Ok(config)
    }
}

/// Access keys for the bucket. Never logged; wiped on drop.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_key: String,
}

impl Credentials {
    /// Load credentials
    pub fn load(path: &Path) -> BackupResult<Self> {
        let mut data = read_file(path)?;
        let parsed = toml::from_str::<Credentials>(&data)
            .map_err(|e| BackupError::config(format!("{}: {}", path.display(), e)));
        data.zeroize();
        parsed
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

fn read_file(path: &Path) -> BackupResult<String> {
    fs::read_to_string(path)
        .map_err(|e| BackupError::config(format!("cannot read {}: {}", path.display(), e)))
}
