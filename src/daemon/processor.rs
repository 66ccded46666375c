use std::sync::Arc;

use tracing::debug;
use tracing::instrument;
use tracing::warn;

use super::Request;
use super::RequestKind;
use super::Response;
use crate::metrics::REQUESTS;
use crate::BackendExecutor;
use crate::CascadeConfig;
use crate::CascadeEngine;
use crate::ConfigStore;
use crate::Error;
use crate::FieldValues;
use crate::InstanceKey;
use crate::LockOwner;
use crate::MetadataCatalog;
use crate::ObjectDescriptor;
use crate::Ownership;
use crate::ReconcileEngine;
use crate::Result;
use crate::StorageError;
use crate::WriteLockArbiter;
use crate::WriteLockGuard;

/// Runs one request end to end on a worker.
///
/// Write-class requests hold the write lock for their whole run, cascade
/// and reconciliation included. Reads go straight to the store.
pub struct RequestProcessor {
    catalog: Arc<MetadataCatalog>,
    store: Arc<dyn ConfigStore>,
    executor: Arc<dyn BackendExecutor>,
    lock: Arc<WriteLockArbiter>,
    cascade: CascadeEngine,
    reconciler: ReconcileEngine,
}

impl RequestProcessor {
    pub fn new(
        catalog: Arc<MetadataCatalog>,
        store: Arc<dyn ConfigStore>,
        executor: Arc<dyn BackendExecutor>,
        lock: Arc<WriteLockArbiter>,
        cascade_config: &CascadeConfig,
    ) -> Self {
        let cascade = CascadeEngine::new(catalog.clone(), store.clone(), executor.clone(), cascade_config);
        let reconciler = ReconcileEngine::new(catalog.clone(), store.clone(), executor.clone());
        Self {
            catalog,
            store,
            executor,
            lock,
            cascade,
            reconciler,
        }
    }

    /// Executes `request` and delivers the response to its requester.
    #[instrument(skip_all, fields(txn = request.txn_id, caller = request.caller_id, worker = worker_id))]
    pub async fn process(
        &self,
        worker_id: u32,
        mut request: Request,
    ) {
        let response = match self.execute(worker_id, &request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} failed: {}", request.kind, e);
                Response::from_error(request.txn_id, &e)
            }
        };
        REQUESTS
            .with_label_values(&[request.kind.as_str(), &format!("{:?}", response.code)])
            .inc();
        request.respond(response);
    }

    pub async fn execute(
        &self,
        worker_id: u32,
        request: &Request,
    ) -> Result<Response> {
        let txn_id = request.txn_id;
        debug!("executing {}", request.kind);

        let Some(kind) = request.kind.write_kind() else {
            return match &request.kind {
                RequestKind::GetValue { object, key, params } => self.get_value(txn_id, object, key, params),
                _ => Err(Error::Fatal(format!("{} has no lock kind", request.kind))),
            };
        };

        let owner = LockOwner::new(txn_id, request.caller_id, worker_id);
        let guard = self.lock.acquire(kind, owner).await?;

        match &request.kind {
            RequestKind::SetValue { object, key, fields } => self.set_value(&guard, txn_id, object, key, fields).await,
            RequestKind::AddObject {
                object,
                parent_key,
                fields,
            } => self.add_object(&guard, txn_id, object, parent_key, fields).await,
            RequestKind::DeleteObject { object, key } => self.delete_object(&guard, txn_id, object, key).await,
            RequestKind::DiscoverConfig { objects } => self.discover(&guard, txn_id, objects).await,
            RequestKind::GetValue { .. } => Err(Error::Fatal(format!("{} took the write lock", request.kind))),
        }
    }

    fn descriptor(
        &self,
        object: &str,
    ) -> Result<Arc<ObjectDescriptor>> {
        self.catalog
            .descriptor(object)
            .ok_or_else(|| Error::NotFound(format!("object {object}")))
    }

    fn stored_fields(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<FieldValues> {
        self.store.field_values(object, key)?.ok_or_else(|| {
            StorageError::RowNotFound {
                object: object.name.clone(),
                key: key.to_string(),
            }
            .into()
        })
    }

    /// Rejects unknown parameters and writes to index parameters.
    fn check_fields(
        object: &ObjectDescriptor,
        fields: &FieldValues,
    ) -> Result<()> {
        for param in fields.keys() {
            if !object.has_param(param) {
                return Err(Error::Validation(format!("{} has no parameter {}", object.name, param)));
            }
            if object.index_position(param).is_some() {
                return Err(Error::Validation(format!(
                    "{}.{} is an index and cannot be written",
                    object.name, param
                )));
            }
        }
        Ok(())
    }

    fn get_value(
        &self,
        txn_id: u64,
        object: &str,
        key: &InstanceKey,
        params: &[String],
    ) -> Result<Response> {
        let object = self.descriptor(object)?;
        let mut stored = self.stored_fields(&object, key)?;

        let mut response = Response::ok(txn_id);
        if params.is_empty() {
            response.values = stored;
            return Ok(response);
        }
        for param in params {
            if !object.has_param(param) {
                return Err(Error::Validation(format!("{} has no parameter {}", object.name, param)));
            }
            let value = match object.index_position(param) {
                Some(pos) => key.components().get(pos).map(u32::to_string),
                None => stored.remove(param),
            };
            response.values.insert(param.clone(), value.unwrap_or_default());
        }
        Ok(response)
    }

    async fn set_value(
        &self,
        _guard: &WriteLockGuard,
        txn_id: u64,
        object: &str,
        key: &InstanceKey,
        fields: &FieldValues,
    ) -> Result<Response> {
        let object = self.descriptor(object)?;
        if !object.writable || !object.configurable {
            return Err(Error::Validation(format!("{} is not configurable", object.name)));
        }
        Self::check_fields(&object, fields)?;
        self.stored_fields(&object, key)?;

        let restart = self.executor.update_instance(&object, key, fields).await?;
        self.store.mark_user_configured(&object, key)?;

        let mut response = Response::ok(txn_id);
        if restart {
            response.restart_backends.insert(object.backend.clone());
        }
        Ok(response)
    }

    async fn add_object(
        &self,
        guard: &WriteLockGuard,
        txn_id: u64,
        object: &str,
        parent_key: &InstanceKey,
        fields: &FieldValues,
    ) -> Result<Response> {
        let object = self.descriptor(object)?;
        if !object.writable || !object.is_multi_instance() {
            return Err(Error::Validation(format!("instances of {} cannot be added", object.name)));
        }
        if parent_key.len() + 1 != object.key_shape() {
            return Err(Error::Validation(format!(
                "{} needs a parent key of {} indices, got [{}]",
                object.name,
                object.key_shape() - 1,
                parent_key
            )));
        }
        Self::check_fields(&object, fields)?;
        if let Some(parent) = &object.parent {
            let parent = self.descriptor(parent)?;
            self.stored_fields(&parent, &parent_key.prefix(parent.key_shape()))?;
        }

        let created = self
            .executor
            .create_instance(&object, parent_key, &object.fields_with_defaults(fields), Ownership::user())
            .await?;

        let mut response = match self.cascade.auto_create(guard, &object, &created.key).await {
            Ok(report) => {
                let mut response = Response::ok(txn_id);
                response.restart_backends.extend(report.restart_backends.iter().cloned());
                response.cascade = Some(report);
                response
            }
            // the base instance stays; the requester learns its key with the failure
            Err(e) => Response::from_error(txn_id, &e),
        };
        if created.restart_needed {
            response.restart_backends.insert(object.backend.clone());
        }
        response.new_key = Some(created.key);
        Ok(response)
    }

    async fn delete_object(
        &self,
        guard: &WriteLockGuard,
        txn_id: u64,
        object: &str,
        key: &InstanceKey,
    ) -> Result<Response> {
        let object = self.descriptor(object)?;
        if !object.writable || !object.is_multi_instance() {
            return Err(Error::Validation(format!("instances of {} cannot be deleted", object.name)));
        }
        self.stored_fields(&object, key)?;

        let report = self.cascade.auto_delete(guard, &object, std::slice::from_ref(key)).await?;

        let mut response = Response::ok(txn_id);
        response.restart_backends.extend(report.restart_backends.iter().cloned());
        response.cascade = Some(report);
        Ok(response)
    }

    async fn discover(
        &self,
        guard: &WriteLockGuard,
        txn_id: u64,
        objects: &[String],
    ) -> Result<Response> {
        let report = if objects.is_empty() {
            self.reconciler.discover_all(guard).await?
        } else {
            let descriptors = objects
                .iter()
                .map(|name| self.descriptor(name))
                .collect::<Result<Vec<_>>>()?;
            self.reconciler.discover(guard, &descriptors).await?
        };

        let mut response = Response::ok(txn_id);
        response.restart_backends = report.restart_backends();
        response.discover = Some(report);
        Ok(response)
    }
}
