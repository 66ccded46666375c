use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::BackendKey;
use crate::BackendKeyRow;
use crate::ConfigStore;
use crate::FieldValues;
use crate::InstanceKey;
use crate::ObjectDescriptor;
use crate::Result;

/// One operation style's way of touching a backend.
///
/// Handlers only talk to the backend; the [`OperationRouter`](crate::OperationRouter)
/// keeps the store in step around them. Mutating calls return whether the
/// backend must be restarted.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    async fn list(
        &self,
        object: &ObjectDescriptor,
    ) -> Result<Vec<BackendKeyRow>>;

    async fn create(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        backend_key: &BackendKey,
        fields: &FieldValues,
    ) -> Result<bool>;

    async fn update(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        backend_key: &BackendKey,
        fields: &FieldValues,
    ) -> Result<bool>;

    async fn delete(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        backend_key: &BackendKey,
    ) -> Result<bool>;
}

/// Handler of [`OpStyle::Store`](crate::OpStyle::Store) objects, whose only
/// copy of the configuration is the store itself.
pub struct StoreOperation {
    store: Arc<dyn ConfigStore>,
}

impl StoreOperation {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Operation for StoreOperation {
    async fn list(
        &self,
        object: &ObjectDescriptor,
    ) -> Result<Vec<BackendKeyRow>> {
        Ok(self
            .store
            .fetch_db_keys(object, &InstanceKey::root())?
            .into_iter()
            .map(|row| BackendKeyRow::new(row.backend_key))
            .collect())
    }

    async fn create(
        &self,
        _object: &ObjectDescriptor,
        _key: &InstanceKey,
        _backend_key: &BackendKey,
        _fields: &FieldValues,
    ) -> Result<bool> {
        Ok(false)
    }

    async fn update(
        &self,
        _object: &ObjectDescriptor,
        _key: &InstanceKey,
        _backend_key: &BackendKey,
        _fields: &FieldValues,
    ) -> Result<bool> {
        Ok(false)
    }

    async fn delete(
        &self,
        _object: &ObjectDescriptor,
        _key: &InstanceKey,
        _backend_key: &BackendKey,
    ) -> Result<bool> {
        Ok(false)
    }
}
