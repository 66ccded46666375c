use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::BackendKeyRow;
use crate::FieldValues;
use crate::InstanceKey;
use crate::ObjectDescriptor;
use crate::Ownership;
use crate::Result;

/// Result of creating one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub key: InstanceKey,
    /// The owning backend must be restarted for the change to apply
    pub restart_needed: bool,
}

/// How an instance that already exists in the store is pushed to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    /// The backend has no such instance yet
    Create,
    /// Refresh the backend copy from the stored configuration
    Update,
}

/// Carries out per-instance operations against the store and the owning
/// backend. Every mutating call reports whether a backend restart is
/// needed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackendExecutor: Send + Sync + 'static {
    /// Backend keys of every instance the backend currently knows.
    async fn fetch_backend_keys(
        &self,
        object: &ObjectDescriptor,
    ) -> Result<Vec<BackendKeyRow>>;

    /// Creates a new instance under `parent_key` in the store and on the
    /// backend. On failure nothing the call inserted is left behind.
    async fn create_instance(
        &self,
        object: &ObjectDescriptor,
        parent_key: &InstanceKey,
        fields: &FieldValues,
        ownership: Ownership,
    ) -> Result<CreateOutcome>;

    /// Creates a new instance at the explicit `key`, for objects keyed by
    /// a dependency value. Same cleanup guarantee as
    /// [`create_instance`](Self::create_instance).
    async fn create_instance_at(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        fields: &FieldValues,
        ownership: Ownership,
    ) -> Result<CreateOutcome>;

    async fn update_instance(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        fields: &FieldValues,
    ) -> Result<bool>;

    async fn delete_instance(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
    ) -> Result<bool>;

    /// Materializes or refreshes an already-stored instance on the backend
    /// only; the store is left untouched.
    async fn push_instance(
        &self,
        object: &ObjectDescriptor,
        key: &InstanceKey,
        fields: &FieldValues,
        mode: PushMode,
    ) -> Result<bool>;
}
