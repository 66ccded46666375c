use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::metrics::LOCK_TIMEOUTS;
use crate::metrics::LOCK_WAIT_DURATION_METRIC;
use crate::utils::time::timestamp_millis;
use crate::LockError;
use crate::Result;
use crate::WriteLockConfig;

/// Identity of a write-lock holder. Release requires the exact triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockOwner {
    pub txn_id: u64,
    pub caller_id: u32,
    pub worker_id: u32,
}

impl LockOwner {
    pub fn new(
        txn_id: u64,
        caller_id: u32,
        worker_id: u32,
    ) -> Self {
        Self {
            txn_id,
            caller_id,
            worker_id,
        }
    }
}

impl fmt::Display for LockOwner {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "txn={} caller={} worker={}", self.txn_id, self.caller_id, self.worker_id)
    }
}

/// Write-class request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    SetValue,
    AddObject,
    DeleteObject,
    DiscoverConfig,
}

impl WriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteKind::SetValue => "set_value",
            WriteKind::AddObject => "add_object",
            WriteKind::DeleteObject => "delete_object",
            WriteKind::DiscoverConfig => "discover_config",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteLockToken {
    pub owner: LockOwner,
    pub kind: WriteKind,
    /// Wall clock acquisition time in ms since epoch
    pub acquired_at_ms: u64,
}

#[derive(Debug, Default)]
struct LockState {
    holder: Option<WriteLockToken>,
    waiters: usize,
    closed: bool,
}

/// Serializes every write-class operation behind a single token.
///
/// Waiters are woken by broadcast on release and race for the token; there
/// is no FIFO guarantee. Each waiter's budget grows with the number of
/// waiters already queued when it arrived.
#[derive(Debug)]
pub struct WriteLockArbiter {
    state: Mutex<LockState>,
    released: Notify,
    base_wait: Duration,
    wait_increment: Duration,
}

impl WriteLockArbiter {
    pub fn new(config: &WriteLockConfig) -> Self {
        Self::with_budget(config.base_wait(), config.wait_increment())
    }

    pub fn with_budget(
        base_wait: Duration,
        wait_increment: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            released: Notify::new(),
            base_wait,
            wait_increment,
        }
    }

    /// Takes the lock, waiting up to the caller's budget.
    ///
    /// Re-acquiring with the current holder's triple succeeds at once and
    /// returns a nested guard that does not release on drop.
    pub async fn acquire(
        self: &Arc<Self>,
        kind: WriteKind,
        owner: LockOwner,
    ) -> Result<WriteLockGuard> {
        let started = Instant::now();
        let deadline = {
            let mut state = self.state.lock();
            if let Some(guard) = self.grant(&mut state, kind, owner)? {
                return Ok(guard);
            }
            let ahead = state.waiters;
            state.waiters += 1;
            started + self.base_wait + self.wait_increment * ahead as u32
        };
        debug!("{} waiting for write lock until {:?}", owner, deadline - started);

        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    state.waiters -= 1;
                    return Err(LockError::Closed.into());
                }
                if state.holder.is_none() {
                    state.waiters -= 1;
                    state.holder = Some(Self::token(kind, owner));
                    LOCK_WAIT_DURATION_METRIC.observe(started.elapsed().as_millis() as f64);
                    return Ok(WriteLockGuard::new(self.clone(), owner, true));
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let waited = started.elapsed();
                self.state.lock().waiters -= 1;
                LOCK_TIMEOUTS.inc();
                warn!("{} gave up on write lock after {:?}", owner, waited);
                return Err(LockError::Timeout { waited }.into());
            }
        }
    }

    /// Takes the lock only if it is free (or already held by `owner`).
    pub fn try_acquire(
        self: &Arc<Self>,
        kind: WriteKind,
        owner: LockOwner,
    ) -> Result<WriteLockGuard> {
        let mut state = self.state.lock();
        match self.grant(&mut state, kind, owner)? {
            Some(guard) => Ok(guard),
            None => Err(LockError::Busy {
                txn_id: state.holder.as_ref().map(|t| t.owner.txn_id).unwrap_or_default(),
            }
            .into()),
        }
    }

    fn grant(
        self: &Arc<Self>,
        state: &mut LockState,
        kind: WriteKind,
        owner: LockOwner,
    ) -> Result<Option<WriteLockGuard>> {
        if state.closed {
            return Err(LockError::Closed.into());
        }
        match &state.holder {
            None => {
                state.holder = Some(Self::token(kind, owner));
                LOCK_WAIT_DURATION_METRIC.observe(0.0);
                Ok(Some(WriteLockGuard::new(self.clone(), owner, true)))
            }
            Some(token) if token.owner == owner => Ok(Some(WriteLockGuard::new(self.clone(), owner, false))),
            Some(_) => Ok(None),
        }
    }

    fn token(
        kind: WriteKind,
        owner: LockOwner,
    ) -> WriteLockToken {
        WriteLockToken {
            owner,
            kind,
            acquired_at_ms: timestamp_millis(),
        }
    }

    /// Releases the lock held by `owner`; `force` clears it regardless of
    /// the holder.
    pub fn release(
        &self,
        owner: &LockOwner,
        force: bool,
    ) -> Result<()> {
        let mut state = self.state.lock();
        match &state.holder {
            Some(token) if force || token.owner == *owner => {
                if force && token.owner != *owner {
                    warn!("write lock of {} force-released by {}", token.owner, owner);
                }
                state.holder = None;
            }
            None if force => return Ok(()),
            _ => return Err(LockError::Denied { txn_id: owner.txn_id }.into()),
        }
        drop(state);
        self.released.notify_waiters();
        Ok(())
    }

    /// Refuses further acquisitions and fails every current waiter.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.released.notify_waiters();
    }

    pub fn holder(&self) -> Option<WriteLockToken> {
        self.state.lock().holder.clone()
    }

    pub fn waiters(&self) -> usize {
        self.state.lock().waiters
    }
}

/// Proof that the write lock is held; releases it on drop.
#[derive(Debug)]
pub struct WriteLockGuard {
    arbiter: Arc<WriteLockArbiter>,
    owner: LockOwner,
    outermost: bool,
    released: bool,
}

impl WriteLockGuard {
    fn new(
        arbiter: Arc<WriteLockArbiter>,
        owner: LockOwner,
        outermost: bool,
    ) -> Self {
        Self {
            arbiter,
            owner,
            outermost,
            released: false,
        }
    }

    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }

    /// Releases now instead of at drop, reporting a forced takeover as Denied.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        if self.outermost {
            self.arbiter.release(&self.owner, false)
        } else {
            Ok(())
        }
    }
}

impl Drop for WriteLockGuard {
    fn drop(&mut self) {
        if self.outermost && !self.released {
            if let Err(e) = self.arbiter.release(&self.owner, false) {
                debug!("write lock already gone at guard drop: {}", e);
            }
        }
    }
}
