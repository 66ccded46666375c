use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::info;

use crate::AdmissionError;
use crate::HoldConfig;
use crate::Result;

/// An active hold window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldStatus {
    pub reason: String,
    pub holder: String,
    pub started_at: Instant,
    pub interval: Duration,
}

impl HoldStatus {
    pub fn expires_at(&self) -> Instant {
        self.started_at + self.interval
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at().saturating_duration_since(Instant::now())
    }
}

/// Process-wide suspend flag checked at admission.
///
/// The window ends by itself once its interval elapses; expiry is applied
/// lazily by the next check.
#[derive(Debug)]
pub struct HoldGate {
    record: Mutex<Option<HoldStatus>>,
    default_interval: Duration,
}

impl HoldGate {
    pub fn new(config: &HoldConfig) -> Self {
        Self::with_default_interval(config.default_interval())
    }

    pub fn with_default_interval(default_interval: Duration) -> Self {
        Self {
            record: Mutex::new(None),
            default_interval,
        }
    }

    pub fn set_hold(
        &self,
        reason: impl Into<String>,
        interval: Option<Duration>,
        holder: impl Into<String>,
    ) -> Result<()> {
        let mut record = self.record.lock();
        Self::expire(&mut record);
        if let Some(active) = record.as_ref() {
            return Err(AdmissionError::AlreadyHeld {
                reason: active.reason.clone(),
            }
            .into());
        }

        let status = HoldStatus {
            reason: reason.into(),
            holder: holder.into(),
            started_at: Instant::now(),
            interval: interval.unwrap_or(self.default_interval),
        };
        info!(
            "hold set by {} for {:?}: {}",
            status.holder, status.interval, status.reason
        );
        *record = Some(status);
        Ok(())
    }

    /// Reason of the active hold, `None` when requests may pass.
    pub fn check_hold(&self) -> Option<String> {
        let mut record = self.record.lock();
        Self::expire(&mut record);
        record.as_ref().map(|s| s.reason.clone())
    }

    /// Rejects with [`AdmissionError::Held`] while a hold is active.
    pub fn admit(&self) -> Result<()> {
        match self.check_hold() {
            Some(reason) => Err(AdmissionError::Held { reason }.into()),
            None => Ok(()),
        }
    }

    /// Ends the window early. Returns false when no hold was active.
    pub fn clear_hold(
        &self,
        holder: &str,
    ) -> Result<bool> {
        let mut record = self.record.lock();
        Self::expire(&mut record);
        match record.as_ref() {
            None => Ok(false),
            Some(active) if active.holder == holder => {
                info!("hold cleared early by {}", holder);
                *record = None;
                Ok(true)
            }
            Some(active) => Err(AdmissionError::NotHolder {
                holder: active.holder.clone(),
            }
            .into()),
        }
    }

    pub fn status(&self) -> Option<HoldStatus> {
        let mut record = self.record.lock();
        Self::expire(&mut record);
        record.clone()
    }

    fn expire(record: &mut Option<HoldStatus>) {
        if record.as_ref().is_some_and(|s| Instant::now() >= s.expires_at()) {
            if let Some(s) = record.take() {
                info!("hold expired: {}", s.reason);
            }
        }
    }
}
