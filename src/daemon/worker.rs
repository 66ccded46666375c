use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;

use super::Request;
use super::RequestProcessor;
use crate::Error;
use crate::Result;
use crate::TaskQueue;

/// Fixed set of workers draining the task queue.
///
/// Each task is taken by exactly one worker; workers exit once the queue
/// has been drained.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        count: usize,
        queue: Arc<TaskQueue<Request>>,
        processor: Arc<RequestProcessor>,
    ) -> Self {
        let handles = (1..=count as u32)
            .map(|worker_id| {
                let queue = queue.clone();
                let processor = processor.clone();
                tokio::spawn(async move {
                    debug!("worker {} started", worker_id);
                    while let Some(request) = queue.take().await {
                        processor.process(worker_id, request).await;
                    }
                    debug!("worker {} stopped", worker_id);
                })
            })
            .collect();
        info!("worker pool started with {} workers", count);
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every worker to finish. The queue must be draining.
    pub async fn join(self) -> Result<()> {
        for handle in self.handles {
            handle.await.map_err(Error::TaskFailed)?;
        }
        Ok(())
    }
}
