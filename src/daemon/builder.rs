//! Assembles a [`Daemon`] from [`Settings`] and optional component
//! overrides.
//!
//! Components left unset get the production defaults: a sled-backed store
//! under `storage.db_root_dir` and an [`OperationRouter`] carrying the
//! registered operation handlers.
//!
//! ## Example
//! ```ignore
//! let daemon = DaemonBuilder::new(settings)
//!     .handler(OpStyle::BackendProtocol, Arc::new(ProtocolOperation::new(channel)))
//!     .build()?;
//! ```
//!
//! `build()` spawns the worker pool, so it must run inside a tokio runtime.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tracing::debug;
use tracing::info;

use super::Daemon;
use super::Dispatcher;
use super::RequestProcessor;
use super::WorkerPool;
use crate::init_sled_config_db;
use crate::BackendExecutor;
use crate::ConfigStore;
use crate::Error;
use crate::HoldGate;
use crate::MetadataCatalog;
use crate::OpStyle;
use crate::Operation;
use crate::OperationRouter;
use crate::Result;
use crate::Settings;
use crate::SledConfigStore;
use crate::TaskQueue;
use crate::WriteLockArbiter;

pub struct DaemonBuilder {
    settings: Settings,
    store: Option<Arc<dyn ConfigStore>>,
    executor: Option<Arc<dyn BackendExecutor>>,
    handlers: Vec<(OpStyle, Arc<dyn Operation>)>,
}

impl DaemonBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            store: None,
            executor: None,
            handlers: Vec::new(),
        }
    }

    /// Sets a custom store implementation
    pub fn store(
        mut self,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the default router entirely; registered handlers are then
    /// ignored.
    pub fn executor(
        mut self,
        executor: Arc<dyn BackendExecutor>,
    ) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Registers the handler of one operation style on the default router
    pub fn handler(
        mut self,
        style: OpStyle,
        handler: Arc<dyn Operation>,
    ) -> Self {
        self.handlers.push((style, handler));
        self
    }

    /// Validates the settings, then wires store, router, admission and
    /// workers together. Workers are spawned on the current runtime.
    pub fn build(self) -> Result<Daemon> {
        let settings = Arc::new(self.settings.validate()?);

        let store = match self.store {
            Some(store) => store,
            None => {
                let db = init_sled_config_db(&settings.storage.db_root_dir)?;
                Arc::new(SledConfigStore::new(db)?) as Arc<dyn ConfigStore>
            }
        };

        let catalog = Arc::new(MetadataCatalog::load(store.as_ref())?);
        if catalog.is_empty() {
            return Err(Error::Fatal("store holds no object descriptors".to_string()));
        }
        info!("metadata catalog loaded: {} objects", catalog.len());

        let executor = match self.executor {
            Some(executor) => executor,
            None => {
                let mut router = OperationRouter::new(store.clone());
                for (style, handler) in self.handlers {
                    debug!("registering {} handler", style);
                    router = router.with_handler(style, handler);
                }
                Arc::new(router) as Arc<dyn BackendExecutor>
            }
        };

        let lock = Arc::new(WriteLockArbiter::new(&settings.write_lock));
        let hold = Arc::new(HoldGate::new(&settings.hold));
        let queue = Arc::new(TaskQueue::new(settings.admission.queue_capacity));

        let processor = Arc::new(RequestProcessor::new(
            catalog,
            store,
            executor,
            lock.clone(),
            &settings.cascade,
        ));
        let workers = WorkerPool::spawn(settings.admission.worker_count, queue.clone(), processor);

        Ok(Daemon {
            dispatcher: Arc::new(Dispatcher::new(hold, queue.clone(), lock.clone())),
            queue,
            lock,
            workers,
            next_internal_txn: AtomicU64::new(1),
            settings,
        })
    }
}
