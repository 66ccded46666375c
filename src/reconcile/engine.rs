use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::merge_walk;
use super::prepare_backend_rows;
use super::prepare_db_rows;
use super::ReconcileAction;
use super::ReconcilePlan;
use crate::metrics::RECONCILE_ACTIONS;
use crate::BackendExecutor;
use crate::BackendKeyRow;
use crate::ConfigStore;
use crate::DbKeyRow;
use crate::Error;
use crate::FieldValues;
use crate::InstanceKey;
use crate::MetadataCatalog;
use crate::ObjectDescriptor;
use crate::Ownership;
use crate::PushMode;
use crate::Result;
use crate::WriteLockGuard;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub succeeded: usize,
    pub failed: usize,
}

/// Outcome of reconciling one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub object: String,
    pub deleted_from_db: ActionCounts,
    pub added_to_db: ActionCounts,
    pub added_to_backend: ActionCounts,
    pub updated_backend: ActionCounts,
    pub retained: usize,
    pub restart_backends: BTreeSet<String>,
}

impl ReconcileReport {
    fn new(object: &ObjectDescriptor) -> Self {
        Self {
            object: object.name.clone(),
            ..Default::default()
        }
    }

    pub fn failures(&self) -> usize {
        self.deleted_from_db.failed + self.added_to_db.failed + self.added_to_backend.failed + self.updated_backend.failed
    }

    fn counts(
        &mut self,
        action: ReconcileAction,
    ) -> Option<&mut ActionCounts> {
        match action {
            ReconcileAction::DeleteFromDb => Some(&mut self.deleted_from_db),
            ReconcileAction::AddToDb => Some(&mut self.added_to_db),
            ReconcileAction::AddToBackend => Some(&mut self.added_to_backend),
            ReconcileAction::UpdateBackend => Some(&mut self.updated_backend),
            ReconcileAction::Retain => None,
        }
    }
}

/// Outcome of a discover pass over several objects.
#[derive(Debug, Clone, Default)]
pub struct DiscoverReport {
    pub reports: Vec<ReconcileReport>,
    /// Objects whose reconciliation could not run, with the reason
    pub failed_objects: Vec<(String, String)>,
}

impl DiscoverReport {
    pub fn restart_backends(&self) -> BTreeSet<String> {
        self.reports.iter().flat_map(|r| r.restart_backends.iter().cloned()).collect()
    }
}

/// Converges the store and the backends instance by instance.
pub struct ReconcileEngine {
    catalog: Arc<MetadataCatalog>,
    store: Arc<dyn ConfigStore>,
    executor: Arc<dyn BackendExecutor>,
}

impl ReconcileEngine {
    pub fn new(
        catalog: Arc<MetadataCatalog>,
        store: Arc<dyn ConfigStore>,
        executor: Arc<dyn BackendExecutor>,
    ) -> Self {
        Self {
            catalog,
            store,
            executor,
        }
    }

    /// Reconciles every object in `objects`, parents before nested children.
    ///
    /// An object whose pass fails is recorded and skipped; a system failure
    /// ends the whole discover.
    pub async fn discover(
        &self,
        guard: &WriteLockGuard,
        objects: &[Arc<ObjectDescriptor>],
    ) -> Result<DiscoverReport> {
        let mut ordered: Vec<&Arc<ObjectDescriptor>> = objects.iter().collect();
        ordered.sort_by_key(|d| d.key_shape());

        let mut report = DiscoverReport::default();
        for object in ordered {
            match self.reconcile(guard, object).await {
                Ok(r) => report.reports.push(r),
                Err(e) if e.is_system() => return Err(e),
                Err(e) => {
                    warn!("reconcile of {} skipped: {}", object.name, e);
                    report.failed_objects.push((object.name.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Every object in the catalog.
    pub async fn discover_all(
        &self,
        guard: &WriteLockGuard,
    ) -> Result<DiscoverReport> {
        let objects = self.catalog.objects();
        self.discover(guard, &objects).await
    }

    #[instrument(skip_all, fields(object = %object.name))]
    pub async fn reconcile(
        &self,
        _guard: &WriteLockGuard,
        object: &ObjectDescriptor,
    ) -> Result<ReconcileReport> {
        if !object.is_multi_instance() {
            return self.reconcile_scalar(object).await;
        }

        let db = prepare_db_rows(&object.name, self.store.fetch_db_keys(object, &InstanceKey::root())?);
        let be = prepare_backend_rows(&object.name, self.executor.fetch_backend_keys(object).await?);
        let plan = ReconcilePlan::build(object, merge_walk(&db, &be));
        info!(
            "{}: {} store rows, {} backend rows -> delete_from_db={} add_to_db={} add_to_backend={} update_backend={} retain={}",
            object.name,
            db.len(),
            be.len(),
            plan.delete_from_db.len(),
            plan.add_to_db.len(),
            plan.add_to_backend.len(),
            plan.update_backend.len(),
            plan.retained.len()
        );

        let mut report = ReconcileReport::new(object);
        report.retained = plan.retained.len();

        for row in &plan.delete_from_db {
            let outcome = self.store.delete_row(object, &row.key).map(|_| false);
            self.record(&mut report, object, ReconcileAction::DeleteFromDb, row, outcome)?;
        }
        for row in &plan.add_to_db {
            let outcome = self.add_to_db(object, row);
            self.record_backend_row(&mut report, object, row, outcome)?;
        }
        for row in &plan.add_to_backend {
            let outcome = self.push(object, row, PushMode::Create).await;
            self.record(&mut report, object, ReconcileAction::AddToBackend, row, outcome)?;
        }
        for row in &plan.update_backend {
            let outcome = self.push(object, row, PushMode::Update).await;
            self.record(&mut report, object, ReconcileAction::UpdateBackend, row, outcome)?;
        }

        if report.failures() > 0 {
            warn!("{}: {} reconcile actions failed", object.name, report.failures());
        }
        Ok(report)
    }

    /// Single-instance objects have nothing to match: user configuration is
    /// pushed, anything else is left alone.
    async fn reconcile_scalar(
        &self,
        object: &ObjectDescriptor,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new(object);
        let row = self
            .store
            .fetch_db_keys(object, &InstanceKey::root())?
            .into_iter()
            .find(|r| r.key.is_empty());

        match row {
            Some(row) if row.ownership().touched_by_user() => {
                let outcome = self.push(object, &row, PushMode::Update).await;
                self.record(&mut report, object, ReconcileAction::UpdateBackend, &row, outcome)?;
            }
            Some(_) => report.retained = 1,
            None => debug!("{} has no stored configuration", object.name),
        }
        Ok(report)
    }

    async fn push(
        &self,
        object: &ObjectDescriptor,
        row: &DbKeyRow,
        mode: PushMode,
    ) -> Result<bool> {
        let fields = self.store.field_values(object, &row.key)?.unwrap_or_default();
        self.executor.push_instance(object, &row.key, &fields, mode).await
    }

    /// Stores a backend-only instance, anchored under the parent instance
    /// whose backend key prefixes it.
    fn add_to_db(
        &self,
        object: &ObjectDescriptor,
        row: &BackendKeyRow,
    ) -> Result<bool> {
        let (parent_key, anchor_len) = match &object.parent {
            Some(parent_name) => {
                let parent = self
                    .catalog
                    .descriptor(parent_name)
                    .ok_or_else(|| Error::NotFound(format!("parent object {parent_name}")))?;
                let anchor = self
                    .store
                    .fetch_db_keys(&parent, &InstanceKey::root())?
                    .into_iter()
                    .filter(|p| p.backend_key.is_prefix_of(&row.backend_key))
                    .max_by_key(|p| p.backend_key.len())
                    .ok_or_else(|| {
                        Error::NotFound(format!("no {} instance anchors backend key {}", parent.name, row.backend_key))
                    })?;
                (anchor.key, anchor.backend_key.len())
            }
            None => (InstanceKey::root(), 0),
        };

        let own_parts = &row.backend_key.parts()[anchor_len..];
        let fields: FieldValues = object
            .backend_key_params
            .iter()
            .filter(|p| object.index_position(p).is_none())
            .zip(own_parts.iter())
            .map(|(p, v)| (p.clone(), v.clone()))
            .collect();

        let key = self.store.allocate_row(
            object,
            &parent_key,
            Some(row.backend_key.clone()),
            Ownership::system(),
            &fields,
        )?;
        debug!("{}: stored backend instance {} as [{}]", object.name, row.backend_key, key);
        Ok(false)
    }

    fn record(
        &self,
        report: &mut ReconcileReport,
        object: &ObjectDescriptor,
        action: ReconcileAction,
        row: &DbKeyRow,
        outcome: Result<bool>,
    ) -> Result<()> {
        self.tally(report, object, action, &row.backend_key.to_string(), outcome)
    }

    fn record_backend_row(
        &self,
        report: &mut ReconcileReport,
        object: &ObjectDescriptor,
        row: &BackendKeyRow,
        outcome: Result<bool>,
    ) -> Result<()> {
        self.tally(report, object, ReconcileAction::AddToDb, &row.backend_key.to_string(), outcome)
    }

    fn tally(
        &self,
        report: &mut ReconcileReport,
        object: &ObjectDescriptor,
        action: ReconcileAction,
        backend_key: &str,
        outcome: Result<bool>,
    ) -> Result<()> {
        let status = match outcome {
            Ok(restart) => {
                if restart {
                    report.restart_backends.insert(object.backend.clone());
                }
                if let Some(c) = report.counts(action) {
                    c.succeeded += 1;
                }
                "ok"
            }
            Err(e) if e.is_system() => return Err(e),
            Err(e) => {
                warn!("{} {} {} failed: {}", object.name, action, backend_key, e);
                if let Some(c) = report.counts(action) {
                    c.failed += 1;
                }
                "failed"
            }
        };
        RECONCILE_ACTIONS
            .with_label_values(&[&object.name, action.as_str(), status])
            .inc();
        Ok(())
    }
}
