use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_MAX_CASCADE_DEPTH;
use crate::constants::MAX_CASCADE_DEPTH_LIMIT;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CascadeConfig {
    /// Recursion bound of auto-create/auto-delete; deeper levels are
    /// silently skipped
    ///
    /// Default: 5, at most 16
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl CascadeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 || self.max_depth > MAX_CASCADE_DEPTH_LIMIT {
            return Err(Error::Config(ConfigError::Message(format!(
                "cascade.max_depth must be within 1..={MAX_CASCADE_DEPTH_LIMIT}, got {}",
                self.max_depth
            ))));
        }
        Ok(())
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_CASCADE_DEPTH
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ReconcileConfig {
    /// Interval of the periodic discover pass over every object, 0 disables it
    ///
    /// Default: 0
    #[serde(default)]
    pub sync_interval_secs: u64,
}

impl ReconcileConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }

    pub fn sync_interval(&self) -> Option<Duration> {
        (self.sync_interval_secs > 0).then(|| Duration::from_secs(self.sync_interval_secs))
    }
}
