use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tracing::error;
use tracing::instrument;
use tracing::warn;

use super::BackendExecutor;
use super::CreateOutcome;
use super::Operation;
use super::PushMode;
use super::StoreOperation;
use crate::BackendKey;
use crate::BackendKeyRow;
use crate::ConfigStore;
use crate::ExecutorError;
use crate::FieldValues;
use crate::InstanceKey;
use crate::ObjectDescriptor;
use crate::OpStyle;
use crate::Ownership;
use crate::Result;
use crate::StorageError;

/// [`BackendExecutor`] that routes each verb to the handler registered for
/// the descriptor's operation style for that verb.
///
/// Store rows are written around the handler call: before it on create
/// (the handler needs the allocated key), after it on update and delete
/// (a failed backend call leaves the store untouched).
pub struct OperationRouter {
    store: Arc<dyn ConfigStore>,
    handlers: HashMap<OpStyle, Arc<dyn Operation>>,
}

impl OperationRouter {
    /// Router with the built-in [`StoreOperation`] registered.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        let mut handlers: HashMap<OpStyle, Arc<dyn Operation>> = HashMap::new();
        handlers.insert(OpStyle::Store, Arc::new(StoreOperation::new(store.clone())));
        Self { store, handlers }
    }

    pub fn with_handler(
        mut self,
        style: OpStyle,
        handler: Arc<dyn Operation>,
    ) -> Self {
        self.handlers.insert(style, handler);
        self
    }

    fn handler(
        &self,
        style: OpStyle,
    ) -> Result<&Arc<dyn Operation>> {
        self.handlers.get(&style).ok_or_else(|| {
            ExecutorError::NoHandler {
                style: style.to_string(),
            }
            .into()
        })
    }

    /// Runs the handler's create for a row the store just inserted, removing
    /// the row again when the handler fails.
    async fn create_stored(
        &self,
        handler: &Arc<dyn Operation>,
        object: &ObjectDescriptor,
        key: InstanceKey,
        fields: &FieldValues,
    ) -> Result<CreateOutcome> {
        let result = match self.stored_backend_key(object, &key) {
            Ok(backend_key) => handler.create(object, &key, &backend_key, fields).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(restart_needed) => {
                debug!("created {}[{}]", object.name, key);
                Ok(CreateOutcome { key, restart_needed })
            }
            Err(e) => {
                warn!("create {}[{}] failed, removing its row: {}", object.name, key, e);
                if let Err(cleanup) = self.store.delete_row(object, &key) {
                    error!("failed to remove row {}[{}]: {}", object.name, key, cleanup);
                }
                Err(e)
            }
        }
    }

    fn stored_backend_key(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<BackendKey> {
        self.store
            .fetch_db_keys(object, key)?
            .into_iter()
            .find(|row| &row.key == key)
            .map(|row| row.backend_key)
            .ok_or_else(|| {
                StorageError::RowNotFound {
                    object: object.name.clone(),
                    key: key.to_string(),
                }
                .into()
            })
    }
}

#[async_trait]
impl BackendExecutor for OperationRouter {
    async fn fetch_backend_keys(
        &self,
        object: &ObjectDescriptor,
    ) -> Result<Vec<BackendKeyRow>> {
        self.handler(object.styles.get)?.list(object).await
    }

    #[instrument(skip_all, fields(object = %object.name, parent = %parent_key))]
    async fn create_instance(
        &self,
        object: &ObjectDescriptor,
        parent_key: &InstanceKey,
        fields: &FieldValues,
        ownership: Ownership,
    ) -> Result<CreateOutcome> {
        let handler = self.handler(object.styles.add)?;
        let key = self.store.allocate_row(object, parent_key, None, ownership, fields)?;
        self.create_stored(handler, object, key, fields).await
    }

    #[instrument(skip_all, fields(object = %object.name, key = %key))]
    async fn create_instance_at(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        fields: &FieldValues,
        ownership: Ownership,
    ) -> Result<CreateOutcome> {
        let handler = self.handler(object.styles.add)?;
        self.store.insert_row_at(object, key, None, ownership, fields)?;
        self.create_stored(handler, object, key.clone(), fields).await
    }

    async fn update_instance(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        fields: &FieldValues,
    ) -> Result<bool> {
        let handler = self.handler(object.styles.set)?;
        let backend_key = self.stored_backend_key(object, key)?;
        let restart = handler.update(object, key, &backend_key, fields).await?;
        self.store.update_fields(object, key, fields)?;
        Ok(restart)
    }

    async fn delete_instance(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<bool> {
        let handler = self.handler(object.styles.delete)?;
        let backend_key = self.stored_backend_key(object, key)?;
        let restart = handler.delete(object, key, &backend_key).await?;
        self.store.delete_row(object, key)?;
        debug!("deleted {}[{}]", object.name, key);
        Ok(restart)
    }

    async fn push_instance(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        fields: &FieldValues,
        mode: PushMode,
    ) -> Result<bool> {
        let backend_key = self.stored_backend_key(object, key)?;
        match mode {
            PushMode::Create => {
                self.handler(object.styles.add)?
                    .create(object, key, &backend_key, fields)
                    .await
            }
            PushMode::Update => {
                self.handler(object.styles.set)?
                    .update(object, key, &backend_key, fields)
                    .await
            }
        }
    }
}
