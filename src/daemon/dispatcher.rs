use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::info;

use super::Request;
use super::RequestKind;
use super::Response;
use crate::metrics::QUEUE_REJECTED;
use crate::AdmissionError;
use crate::HoldGate;
use crate::HoldStatus;
use crate::LockOwner;
use crate::Result;
use crate::TaskQueue;
use crate::WriteLockArbiter;
use crate::WriteLockToken;

/// Admission front of the daemon: hold check, then enqueue.
///
/// Also carries the administrative operations on the hold gate and the
/// write lock, which bypass the queue.
pub struct Dispatcher {
    hold: Arc<HoldGate>,
    queue: Arc<TaskQueue<Request>>,
    lock: Arc<WriteLockArbiter>,
}

impl Dispatcher {
    pub fn new(
        hold: Arc<HoldGate>,
        queue: Arc<TaskQueue<Request>>,
        lock: Arc<WriteLockArbiter>,
    ) -> Self {
        Self { hold, queue, lock }
    }

    /// Admits `request` without waiting for it to run.
    pub fn submit(
        &self,
        request: Request,
    ) -> Result<()> {
        if let Err(e) = self.hold.admit() {
            QUEUE_REJECTED.with_label_values(&["held"]).inc();
            debug!("txn {} rejected: {}", request.txn_id, e);
            return Err(e);
        }
        self.queue.submit(request)
    }

    /// Admits a request and waits for its response.
    ///
    /// Admission failures are returned as errors; failures while running
    /// come back inside the response.
    pub async fn call(
        &self,
        txn_id: u64,
        caller_id: u32,
        kind: RequestKind,
    ) -> Result<Response> {
        let (request, reply) = Request::new(txn_id, caller_id, kind);
        self.submit(request)?;
        reply.await.map_err(|_| AdmissionError::QueueClosed.into())
    }

    pub fn set_hold(
        &self,
        reason: &str,
        interval: Option<Duration>,
        holder: &str,
    ) -> Result<()> {
        self.hold.set_hold(reason, interval, holder)
    }

    pub fn clear_hold(
        &self,
        holder: &str,
    ) -> Result<bool> {
        self.hold.clear_hold(holder)
    }

    pub fn hold_status(&self) -> Option<HoldStatus> {
        self.hold.status()
    }

    /// Clears the write lock whoever holds it. Returns the evicted holder.
    pub fn force_unlock(
        &self,
        requested_by: LockOwner,
    ) -> Result<Option<LockOwner>> {
        let evicted = self.lock.holder().map(|t| t.owner);
        self.lock.release(&requested_by, true)?;
        if let Some(owner) = evicted {
            info!("write lock of {} cleared by {}", owner, requested_by);
        }
        Ok(evicted)
    }

    pub fn lock_holder(&self) -> Option<WriteLockToken> {
        self.lock.holder()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}
