use std::path::Path;
use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the embedded metadata/value store
    ///
    /// Default: /tmp/cfgmgr/db
    #[serde(default = "default_db_root_dir")]
    pub db_root_dir: PathBuf,

    /// Log files output directory
    ///
    /// Default: ./logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_root_dir: default_db_root_dir(),
            log_dir: default_log_dir(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        validate_directory(&self.db_root_dir, "storage.db_root_dir")?;
        validate_directory(&self.log_dir, "storage.log_dir")?;
        Ok(())
    }
}

/// Ensures directory path is valid and, outside tests, creatable
fn validate_directory(
    path: &Path,
    name: &str,
) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Config(ConfigError::Message(format!(
            "{name} path cannot be empty"
        ))));
    }

    #[cfg(not(test))]
    {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| {
                Error::Config(ConfigError::Message(format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    path.display(),
                    e
                )))
            })?;
        }
    }

    Ok(())
}

fn default_db_root_dir() -> PathBuf {
    PathBuf::from("/tmp/cfgmgr/db")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
