use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::metrics::QUEUE_REJECTED;
use crate::AdmissionError;
use crate::Result;

/// Fixed-capacity FIFO between the dispatcher and the worker pool.
///
/// `submit` never blocks: a full queue rejects. After [`TaskQueue::drain`]
/// the remaining tasks are still handed out, then `take` returns `None`.
#[derive(Debug)]
pub struct TaskQueue<T> {
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
    capacity: usize,
    draining: CancellationToken,
}

impl<T: Send> TaskQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
            draining: CancellationToken::new(),
        }
    }

    pub fn submit(
        &self,
        task: T,
    ) -> Result<()> {
        if self.draining.is_cancelled() {
            QUEUE_REJECTED.with_label_values(&["closed"]).inc();
            return Err(AdmissionError::QueueClosed.into());
        }
        match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                QUEUE_REJECTED.with_label_values(&["full"]).inc();
                warn!("task queue full (capacity {}), request rejected", self.capacity);
                Err(AdmissionError::QueueFull {
                    capacity: self.capacity,
                }
                .into())
            }
            Err(TrySendError::Closed(_)) => {
                QUEUE_REJECTED.with_label_values(&["closed"]).inc();
                Err(AdmissionError::QueueClosed.into())
            }
        }
    }

    /// Next task in FIFO order; waits while the queue is empty.
    pub async fn take(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        if self.draining.is_cancelled() {
            return rx.try_recv().ok();
        }
        tokio::select! {
            biased;
            task = rx.recv() => task,
            _ = self.draining.cancelled() => rx.try_recv().ok(),
        }
    }

    /// Switches to non-blocking mode for shutdown.
    pub fn drain(&self) {
        debug!("task queue draining, {} tasks left", self.len());
        self.draining.cancel();
    }

    pub fn is_draining(&self) -> bool {
        self.draining.is_cancelled()
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
