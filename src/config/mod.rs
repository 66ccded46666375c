//! Configuration management for the configuration-manager daemon.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Optional `config/default.toml` next to the working directory
//! - Configuration file named by `CONFIG_PATH` or passed explicitly
//! - Environment variable overrides (`CFGMGR__SECTION__FIELD`)
//! - Section-wise validation
mod admission;
mod backend;
mod cascade;
mod monitoring;
mod storage;
pub use admission::*;
pub use backend::*;
pub use cascade::*;
pub use monitoring::*;
pub use storage::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::ENV_PREFIX;
use crate::Result;

/// Root settings of the daemon.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Task queue and worker pool sizing
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Write-lock wait budget
    #[serde(default)]
    pub write_lock: WriteLockConfig,
    /// Hold window defaults
    #[serde(default)]
    pub hold: HoldConfig,
    /// Dependency cascade bounds
    #[serde(default)]
    pub cascade: CascadeConfig,
    /// Periodic reconciliation
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Backend reply handling
    #[serde(default)]
    pub backend: BackendConfig,
    /// Local store and log locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metrics endpoint
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Settings {
    /// Loads settings from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults
    /// 2. `config/default.toml` (optional)
    /// 3. File named by `CONFIG_PATH` (if set)
    /// 4. `path` argument (if given)
    /// 5. Environment variables with `CFGMGR__` prefix
    ///
    /// Callers MUST call [`Settings::validate`] before using the result.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name("config/default").required(false));

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.admission.validate()?;
        self.write_lock.validate()?;
        self.hold.validate()?;
        self.cascade.validate()?;
        self.reconcile.validate()?;
        self.backend.validate()?;
        self.storage.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}
