#[cfg(test)]
use mockall::automock;

use crate::BackendKey;
use crate::DbKeyRow;
use crate::DependencyEdge;
use crate::FieldValues;
use crate::InstanceKey;
use crate::ObjectDescriptor;
use crate::Ownership;
use crate::Result;

/// Accessor for the metadata/value store.
///
/// # Thread Safety Requirements
///
/// Implementations are shared by every worker. Reads may run while a
/// write-class request is in flight; implementations only need per-call
/// atomicity, not cross-call isolation.
#[cfg_attr(test, automock)]
pub trait ConfigStore: Send + Sync + 'static {
    /// Object descriptors, read once at startup into the catalog.
    fn load_descriptors(&self) -> Result<Vec<ObjectDescriptor>>;

    /// Dependency edges, read once at startup into the catalog.
    fn load_edges(&self) -> Result<Vec<DependencyEdge>>;

    /// Key rows of `object` whose instance key starts with `scope`,
    /// ordered by instance key.
    fn fetch_db_keys(
        &self,
        object: &ObjectDescriptor,
        scope: &InstanceKey,
    ) -> Result<Vec<DbKeyRow>>;

    /// All stored field values of one instance, `None` if the row is absent.
    fn field_values(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<Option<FieldValues>>;

    fn field_value(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        param: &str,
    ) -> Result<Option<String>> {
        Ok(self.field_values(object, key)?.and_then(|mut f| f.remove(param)))
    }

    /// Inserts a new row under `parent_key`, picking the next free index.
    ///
    /// When `backend_key` is `None` it is derived from the object's
    /// backend-key parameters (or the new index) prefixed with the
    /// enclosing parent row's backend key.
    fn allocate_row(
        &self,
        object: &ObjectDescriptor,
        parent_key: &InstanceKey,
        backend_key: Option<BackendKey>,
        ownership: Ownership,
        fields: &FieldValues,
    ) -> Result<InstanceKey>;

    /// Inserts a new row at the explicit `key`, for objects whose index is
    /// given by a dependency value rather than picked by the store.
    ///
    /// Fails with `DuplicateKey` when the row exists; the backend key is
    /// derived as in [`allocate_row`](Self::allocate_row) when `None`.
    fn insert_row_at(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        backend_key: Option<BackendKey>,
        ownership: Ownership,
        fields: &FieldValues,
    ) -> Result<()>;

    /// Merges `fields` into an existing row.
    fn update_fields(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        fields: &FieldValues,
    ) -> Result<()>;

    /// Flags the row's configuration as user-owned.
    fn mark_user_configured(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<()>;

    /// Returns whether a row was removed.
    fn delete_row(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<bool>;
}
