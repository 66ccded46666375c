use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::validate_edge;
use super::CascadeContext;
use super::CascadeReport;
use crate::constants::MAX_CASCADE_DEPTH_LIMIT;
use crate::metrics::CASCADE_INSTANCES;
use crate::BackendExecutor;
use crate::CascadeConfig;
use crate::ConfigStore;
use crate::DependencyClass;
use crate::DependencyEdge;
use crate::Error;
use crate::FieldValues;
use crate::InstanceKey;
use crate::MetadataCatalog;
use crate::ObjectDescriptor;
use crate::Ownership;
use crate::Result;
use crate::WriteLockGuard;

/// Target of a dependent create.
enum ChildSlot {
    /// Next free index under this key
    Under(InstanceKey),
    /// Exactly this key, derived from the dependency value
    At(InstanceKey),
}

/// Creates and deletes dependent instances along the catalog's dependency
/// edges, depth-first and bounded by `max_depth`.
///
/// Both entry points take a [`WriteLockGuard`] so that only the write-lock
/// holder can cascade.
pub struct CascadeEngine {
    catalog: Arc<MetadataCatalog>,
    store: Arc<dyn ConfigStore>,
    executor: Arc<dyn BackendExecutor>,
    max_depth: usize,
}

impl CascadeEngine {
    pub fn new(
        catalog: Arc<MetadataCatalog>,
        store: Arc<dyn ConfigStore>,
        executor: Arc<dyn BackendExecutor>,
        config: &CascadeConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            executor,
            max_depth: config.max_depth.min(MAX_CASCADE_DEPTH_LIMIT),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Creates the dependents of the freshly created `object[new_key]`.
    ///
    /// The first failure stops the whole cascade; dependents created before
    /// it are kept and listed in the abort's partial report.
    #[instrument(skip_all, fields(object = %object.name, key = %new_key))]
    pub async fn auto_create(
        &self,
        _guard: &WriteLockGuard,
        object: &ObjectDescriptor,
        new_key: &InstanceKey,
    ) -> Result<CascadeReport> {
        let mut ctx = CascadeContext::new(self.max_depth);
        match self.create_level(&mut ctx, object, new_key, 0).await {
            Ok(()) => {
                CASCADE_INSTANCES
                    .with_label_values(&["create"])
                    .inc_by(ctx.report.created.len() as u64);
                debug!("auto-create done: {} dependents", ctx.report.created.len());
                Ok(ctx.report)
            }
            Err(e) => {
                let created = ctx.report.created.len() as u64;
                CASCADE_INSTANCES.with_label_values(&["create"]).inc_by(created);
                let abort = ctx.abort(DependencyClass::AutoCreate, object, new_key, e);
                warn!("{}", abort);
                Err(abort.into())
            }
        }
    }

    /// Deletes `object[keys]` and, before them, everything depending on them.
    #[instrument(skip_all, fields(object = %object.name, keys = keys.len()))]
    pub async fn auto_delete(
        &self,
        _guard: &WriteLockGuard,
        object: &ObjectDescriptor,
        keys: &[InstanceKey],
    ) -> Result<CascadeReport> {
        let mut ctx = CascadeContext::new(self.max_depth);
        match self.delete_level(&mut ctx, object, keys, 0).await {
            Ok(()) => {
                CASCADE_INSTANCES
                    .with_label_values(&["delete"])
                    .inc_by(ctx.report.deleted.len() as u64);
                debug!("auto-delete done: {} instances", ctx.report.deleted.len());
                Ok(ctx.report)
            }
            Err(e) => {
                let deleted = ctx.report.deleted.len() as u64;
                CASCADE_INSTANCES.with_label_values(&["delete"]).inc_by(deleted);
                let first = keys.first().cloned().unwrap_or_default();
                let abort = ctx.abort(DependencyClass::AutoDelete, object, &first, e);
                warn!("{}", abort);
                Err(abort.into())
            }
        }
    }

    fn create_level<'a>(
        &'a self,
        ctx: &'a mut CascadeContext,
        object: &'a ObjectDescriptor,
        key: &'a InstanceKey,
        depth: usize,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let edges = self.catalog.edges(&object.name, DependencyClass::AutoCreate);
            if edges.is_empty() {
                return Ok(());
            }
            if depth >= ctx.max_depth {
                info!("auto-create depth bound {} reached at {}[{}]", ctx.max_depth, object.name, key);
                ctx.report.depth_limited += 1;
                return Ok(());
            }

            for edge in edges {
                let Some(child) = self.usable_child(ctx, object, edge) else {
                    continue;
                };

                let (slot, seed) = self
                    .seed_child(object, key, &child, edge)
                    .map_err(|e| ctx.fail(depth, object, key, Some(edge), e))?;
                let fields = child.fields_with_defaults(&seed);

                let created = match &slot {
                    ChildSlot::Under(parent_key) => {
                        self.executor
                            .create_instance(&child, parent_key, &fields, Ownership::system())
                            .await
                    }
                    ChildSlot::At(child_key) => {
                        let present = self
                            .store
                            .field_values(&child, child_key)
                            .map_err(|e| ctx.fail(depth, object, key, Some(edge), e))?
                            .is_some();
                        if present {
                            debug!("{}[{}] already present for {}[{}]", child.name, child_key, object.name, key);
                            continue;
                        }
                        self.executor
                            .create_instance_at(&child, child_key, &fields, Ownership::system())
                            .await
                    }
                };
                let outcome = created.map_err(|e| ctx.fail(depth, object, key, Some(edge), e))?;

                debug!("auto-created {}[{}] for {}[{}]", child.name, outcome.key, object.name, key);
                ctx.report.created.push((child.name.clone(), outcome.key.clone()));
                if outcome.restart_needed {
                    ctx.report.restart_backends.insert(child.backend.clone());
                }

                self.create_level(ctx, &child, &outcome.key, depth + 1).await?;
            }
            Ok(())
        })
    }

    fn delete_level<'a>(
        &'a self,
        ctx: &'a mut CascadeContext,
        object: &'a ObjectDescriptor,
        keys: &'a [InstanceKey],
        depth: usize,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let edges = self.catalog.edges(&object.name, DependencyClass::AutoDelete);
            if !edges.is_empty() && depth >= ctx.max_depth {
                info!("auto-delete depth bound {} reached at {}", ctx.max_depth, object.name);
                ctx.report.depth_limited += 1;
            } else {
                for edge in edges {
                    let Some(child) = self.usable_child(ctx, object, edge) else {
                        continue;
                    };

                    for key in keys {
                        let found = self
                            .dependents(object, key, &child, edge)
                            .map_err(|e| ctx.fail(depth, object, key, Some(edge), e))?;
                        ctx.pending(depth).extend(found);
                    }

                    let pending = ctx.take_pending(depth);
                    if !pending.is_empty() {
                        self.delete_level(ctx, &child, &pending, depth + 1).await?;
                    }
                }
            }

            for key in keys {
                let restart = self
                    .executor
                    .delete_instance(object, key)
                    .await
                    .map_err(|e| ctx.fail(depth, object, key, None, e))?;
                ctx.report.deleted.push((object.name.clone(), key.clone()));
                if restart {
                    ctx.report.restart_backends.insert(object.backend.clone());
                }
            }
            Ok(())
        })
    }

    fn usable_child(
        &self,
        ctx: &mut CascadeContext,
        parent: &ObjectDescriptor,
        edge: &DependencyEdge,
    ) -> Option<Arc<ObjectDescriptor>> {
        match validate_edge(&self.catalog, parent, edge) {
            Ok(child) => Some(child),
            Err(reason) => {
                warn!("skipping dependency edge {}: {}", edge, reason);
                ctx.skip_edge(edge);
                None
            }
        }
    }

    /// Value the parent contributes to the child: its key component when
    /// the parent parameter is an index, its stored field otherwise.
    fn dependency_value(
        &self,
        parent: &ObjectDescriptor,
        parent_key: &InstanceKey,
        edge: &DependencyEdge,
    ) -> Result<Option<String>> {
        match parent.index_position(&edge.parent_param) {
            Some(pos) => Ok(parent_key.components().get(pos).map(u32::to_string)),
            None => self.store.field_value(parent, parent_key, &edge.parent_param),
        }
    }

    /// Where a child about to be created goes, and its initial fields.
    ///
    /// The dependency value lands in the child parameter. When that
    /// parameter is the child's own (last) index, it becomes the key.
    fn seed_child(
        &self,
        parent: &ObjectDescriptor,
        parent_key: &InstanceKey,
        child: &ObjectDescriptor,
        edge: &DependencyEdge,
    ) -> Result<(ChildSlot, FieldValues)> {
        let copied = child.key_shape().saturating_sub(1).min(parent_key.len());
        let child_parent_key = parent_key.prefix(copied);
        let value = self.dependency_value(parent, parent_key, edge)?;

        let mut fields = FieldValues::new();
        match child.index_position(&edge.child_param) {
            Some(pos) if pos < copied => Ok((ChildSlot::Under(child_parent_key), fields)),
            Some(_) => {
                let value = value.ok_or_else(|| {
                    Error::Validation(format!(
                        "{}[{}] has no value for {}, needed as {} index",
                        parent.name, parent_key, edge.parent_param, child.name
                    ))
                })?;
                let index: u32 = value.parse().map_err(|_| {
                    Error::Validation(format!(
                        "{}.{} value {:?} is not a valid {} index",
                        parent.name, edge.parent_param, value, child.name
                    ))
                })?;
                Ok((ChildSlot::At(child_parent_key.child(index)), fields))
            }
            None => {
                match value {
                    Some(value) => {
                        fields.insert(edge.child_param.clone(), value);
                    }
                    None => debug!("{}[{}] has no value for {}", parent.name, parent_key, edge.parent_param),
                }
                Ok((ChildSlot::Under(child_parent_key), fields))
            }
        }
    }

    /// Child rows under the parent's key scope whose child parameter holds
    /// the parent's dependency value.
    fn dependents(
        &self,
        parent: &ObjectDescriptor,
        parent_key: &InstanceKey,
        child: &ObjectDescriptor,
        edge: &DependencyEdge,
    ) -> Result<Vec<InstanceKey>> {
        let Some(value) = self.dependency_value(parent, parent_key, edge)? else {
            return Ok(Vec::new());
        };
        let scope = parent_key.prefix(child.key_shape().saturating_sub(1));

        let mut found = Vec::new();
        for row in self.store.fetch_db_keys(child, &scope)? {
            let current = match child.index_position(&edge.child_param) {
                Some(pos) => row.key.components().get(pos).map(u32::to_string),
                None => self.store.field_value(child, &row.key, &edge.child_param)?,
            };
            if current.as_deref() == Some(value.as_str()) {
                found.push(row.key);
            }
        }
        Ok(found)
    }
}
