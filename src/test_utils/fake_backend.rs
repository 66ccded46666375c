use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::BackendKey;
use crate::BackendKeyRow;
use crate::ExecutorError;
use crate::FieldValues;
use crate::InstanceKey;
use crate::ObjectDescriptor;
use crate::Operation;
use crate::Result;

/// In-memory backend: keeps the backend keys it was told about, records
/// every call as `"<verb> <object> <backend key>"` and fails the
/// `(object, verb)` pairs registered with [`FakeBackend::fail`].
#[derive(Debug, Default)]
pub struct FakeBackend {
    keys: Mutex<HashMap<String, BTreeSet<BackendKey>>>,
    failures: Mutex<HashSet<(String, String)>>,
    restart_objects: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(
        &self,
        object: &str,
        keys: &[&[&str]],
    ) {
        let mut all = self.keys.lock();
        let set = all.entry(object.to_string()).or_default();
        for k in keys {
            set.insert(BackendKey::new(k.iter().copied()));
        }
    }

    pub fn fail(
        &self,
        object: &str,
        verb: &str,
    ) {
        self.failures.lock().insert((object.to_string(), verb.to_string()));
    }

    pub fn require_restart(
        &self,
        object: &str,
    ) {
        self.restart_objects.lock().insert(object.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn keys(
        &self,
        object: &str,
    ) -> Vec<BackendKey> {
        self.keys
            .lock()
            .get(object)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn record(
        &self,
        verb: &'static str,
        object: &ObjectDescriptor,
        backend_key: &BackendKey,
    ) -> Result<bool> {
        self.calls.lock().push(format!("{} {} {}", verb, object.name, backend_key));
        if self.failures.lock().contains(&(object.name.clone(), verb.to_string())) {
            return Err(ExecutorError::Failed {
                object: object.name.clone(),
                verb,
                message: "injected failure".to_string(),
            }
            .into());
        }
        Ok(self.restart_objects.lock().contains(&object.name))
    }
}

#[async_trait]
impl Operation for FakeBackend {
    async fn list(
        &self,
        object: &ObjectDescriptor,
    ) -> Result<Vec<BackendKeyRow>> {
        self.record("list", object, &BackendKey::default())?;
        Ok(self.keys(&object.name).into_iter().map(BackendKeyRow::new).collect())
    }

    async fn create(
        &self,
        object: &ObjectDescriptor,
        _key: &InstanceKey,
        backend_key: &BackendKey,
        _fields: &FieldValues,
    ) -> Result<bool> {
        let restart = self.record("create", object, backend_key)?;
        self.keys
            .lock()
            .entry(object.name.clone())
            .or_default()
            .insert(backend_key.clone());
        Ok(restart)
    }

    async fn update(
        &self,
        object: &ObjectDescriptor,
        _key: &InstanceKey,
        backend_key: &BackendKey,
        _fields: &FieldValues,
    ) -> Result<bool> {
        self.record("update", object, backend_key)
    }

    async fn delete(
        &self,
        object: &ObjectDescriptor,
        _key: &InstanceKey,
        backend_key: &BackendKey,
    ) -> Result<bool> {
        let restart = self.record("delete", object, backend_key)?;
        if let Some(set) = self.keys.lock().get_mut(&object.name) {
            set.remove(backend_key);
        }
        Ok(restart)
    }
}
