//! The running daemon: admission, worker pool and background tasks.
//!
//! ## Example Usage
//! ```rust,no_run
//! # async fn run(settings: cfgmgr::Settings) -> cfgmgr::Result<()> {
//! use tokio_util::sync::CancellationToken;
//!
//! let shutdown = CancellationToken::new();
//! let daemon = cfgmgr::DaemonBuilder::new(settings).build()?;
//! daemon.run(shutdown).await
//! # }
//! ```

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::Dispatcher;
use super::Request;
use super::RequestKind;
use super::WorkerPool;
use crate::constants::INTERNAL_CALLER_ID;
use crate::metrics;
use crate::Result;
use crate::Settings;
use crate::TaskQueue;
use crate::WriteLockArbiter;

pub struct Daemon {
    pub(super) dispatcher: Arc<Dispatcher>,
    pub(super) queue: Arc<TaskQueue<Request>>,
    pub(super) lock: Arc<WriteLockArbiter>,
    pub(super) workers: WorkerPool,
    pub(super) next_internal_txn: AtomicU64,
    pub settings: Arc<Settings>,
}

impl Daemon {
    /// Admission handle for front-ends.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Launches the Prometheus endpoint on the configured port.
    pub fn start_metrics_server(
        &self,
        shutdown: CancellationToken,
    ) {
        let port = self.settings.monitoring.prometheus_port;
        tokio::spawn(async move {
            metrics::start_server(port, shutdown).await;
        });
    }

    /// Queues a discover of every object on behalf of the daemon itself.
    pub fn submit_discover(&self) -> Result<()> {
        let txn_id = self.next_internal_txn.fetch_add(1, Ordering::Relaxed);
        self.dispatcher.submit(Request::detached(
            txn_id,
            INTERNAL_CALLER_ID,
            RequestKind::DiscoverConfig { objects: Vec::new() },
        ))
    }

    /// Serves until `shutdown` is cancelled, then drains the queue, waits
    /// for the workers and closes the write lock.
    pub async fn run(
        self,
        shutdown: CancellationToken,
    ) -> Result<()> {
        match self.settings.reconcile.sync_interval() {
            Some(period) => {
                let mut ticker = tokio::time::interval(period);
                // the first tick completes immediately
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = self.submit_discover() {
                                warn!("periodic discover not admitted: {}", e);
                            }
                        }
                    }
                }
            }
            None => shutdown.cancelled().await,
        }

        info!("shutting down, {} queued requests left", self.queue.len());
        self.queue.drain();
        let joined = self.workers.join().await;
        self.lock.close();
        if let Err(e) = &joined {
            error!("worker failed during shutdown: {:?}", e);
        }
        joined
    }
}
