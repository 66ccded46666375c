use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Task queue and worker pool sizing
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdmissionConfig {
    /// Maximum number of queued requests; submissions beyond it are rejected
    ///
    /// Default: 64
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Number of parallel workers draining the queue
    ///
    /// Default: 4
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            worker_count: default_worker_count(),
        }
    }
}

impl AdmissionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "admission.queue_capacity must be greater than 0".into(),
            )));
        }
        if self.worker_count == 0 {
            return Err(Error::Config(ConfigError::Message(
                "admission.worker_count must be greater than 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_queue_capacity() -> usize {
    64
}
fn default_worker_count() -> usize {
    4
}

/// Write-lock wait budget: `base_wait + waiters_ahead * wait_increment`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WriteLockConfig {
    /// Wait budget of a caller with nobody queued ahead of it
    ///
    /// Default: 3000ms
    #[serde(default = "default_base_wait_ms")]
    pub base_wait_ms: u64,

    /// Extra budget per waiter already queued
    ///
    /// Default: 1000ms
    #[serde(default = "default_wait_increment_ms")]
    pub wait_increment_ms: u64,
}

impl Default for WriteLockConfig {
    fn default() -> Self {
        Self {
            base_wait_ms: default_base_wait_ms(),
            wait_increment_ms: default_wait_increment_ms(),
        }
    }
}

impl WriteLockConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_wait_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "write_lock.base_wait_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn base_wait(&self) -> Duration {
        Duration::from_millis(self.base_wait_ms)
    }

    pub fn wait_increment(&self) -> Duration {
        Duration::from_millis(self.wait_increment_ms)
    }
}

fn default_base_wait_ms() -> u64 {
    3000
}
fn default_wait_increment_ms() -> u64 {
    1000
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HoldConfig {
    /// Hold window used when the requester does not name one
    ///
    /// Default: 120s
    #[serde(default = "default_hold_interval_secs")]
    pub default_interval_secs: u64,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: default_hold_interval_secs(),
        }
    }
}

impl HoldConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_interval_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "hold.default_interval_secs must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn default_interval(&self) -> Duration {
        Duration::from_secs(self.default_interval_secs)
    }
}

fn default_hold_interval_secs() -> u64 {
    120
}
