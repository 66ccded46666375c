use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Backend request/reply parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    /// Time allowed for one backend reply
    ///
    /// Default: 2000ms
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Extra receive attempts after a reply with an outdated sequence number
    ///
    /// Default: 1
    #[serde(default = "default_stale_reply_retries")]
    pub stale_reply_retries: u32,

    /// Depth of the per-backend request channel
    ///
    /// Default: 16
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: default_reply_timeout_ms(),
            stale_reply_retries: default_stale_reply_retries(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reply_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "backend.reply_timeout_ms must be greater than 0".into(),
            )));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "backend.channel_capacity must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

fn default_reply_timeout_ms() -> u64 {
    2000
}
fn default_stale_reply_retries() -> u32 {
    1
}
fn default_channel_capacity() -> usize {
    16
}
