use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cfgmgr::BackendKey;
use cfgmgr::BackendKeyRow;
use cfgmgr::Daemon;
use cfgmgr::DaemonBuilder;
use cfgmgr::DependencyClass;
use cfgmgr::DependencyEdge;
use cfgmgr::ExecutorError;
use cfgmgr::FieldValues;
use cfgmgr::InstanceKey;
use cfgmgr::MemConfigStore;
use cfgmgr::ObjectDescriptor;
use cfgmgr::OpStyle;
use cfgmgr::Operation;
use cfgmgr::Result;
use cfgmgr::Settings;
use cfgmgr::VerbStyles;
use parking_lot::Mutex;

pub const PORT_MAPPING: &str = "Device.NAT.PortMapping";
pub const FIREWALL_RULE: &str = "Device.NAT.PortMapping.FirewallRule";
pub const QOS_CLASS: &str = "Device.NAT.PortMapping.QoSClass";
pub const NAT_BACKEND: &str = "natd";

/// Port mappings owning a firewall rule (pushed to `natd`) and a QoS
/// class (store only), created and deleted with the mapping.
pub fn nat_model() -> (Vec<ObjectDescriptor>, Vec<DependencyEdge>) {
    let mapping = ObjectDescriptor::new(PORT_MAPPING, &["i"])
        .with_params(&["ExternalPort", "InternalClient"])
        .with_backend(NAT_BACKEND, VerbStyles::uniform(OpStyle::RpcBus))
        .with_backend_key(&["ExternalPort"]);
    let rule = ObjectDescriptor::new(FIREWALL_RULE, &["i", "j"])
        .with_params(&["MappingRef", "Target"])
        .with_parent(PORT_MAPPING)
        .with_backend(NAT_BACKEND, VerbStyles::uniform(OpStyle::RpcBus))
        .with_default("Target", "ACCEPT");
    let qos = ObjectDescriptor::new(QOS_CLASS, &["i", "j"])
        .with_params(&["MappingRef"])
        .with_parent(PORT_MAPPING);

    let mut edges = Vec::new();
    for class in [DependencyClass::AutoCreate, DependencyClass::AutoDelete] {
        for child in [FIREWALL_RULE, QOS_CLASS] {
            edges.push(DependencyEdge::new(class, (PORT_MAPPING, "i"), (child, "MappingRef")));
        }
    }
    (vec![mapping, rule, qos], edges)
}

pub fn fields(pairs: &[(&str, &str)]) -> FieldValues {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn key(components: &[u32]) -> InstanceKey {
    InstanceKey::from(components.to_vec())
}

pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.admission.worker_count = 3;
    settings.write_lock.base_wait_ms = 200;
    settings.write_lock.wait_increment_ms = 100;
    // validation creates these outside unit tests
    let scratch = std::env::temp_dir().join("cfgmgr-it");
    settings.storage.db_root_dir = scratch.join("db");
    settings.storage.log_dir = scratch.join("logs");
    settings
}

/// Backend keeping its instances in memory and recording every call.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    keys: Mutex<HashMap<String, BTreeSet<BackendKey>>>,
    failing: Mutex<BTreeSet<(String, &'static str)>>,
    calls: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn seed(
        &self,
        object: &str,
        parts: &[&str],
    ) {
        self.keys
            .lock()
            .entry(object.to_string())
            .or_default()
            .insert(BackendKey::new(parts.iter().copied()));
    }

    pub fn fail(
        &self,
        object: &str,
        verb: &'static str,
    ) {
        self.failing.lock().insert((object.to_string(), verb));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn has(
        &self,
        object: &str,
        parts: &[&str],
    ) -> bool {
        self.keys
            .lock()
            .get(object)
            .is_some_and(|s| s.contains(&BackendKey::new(parts.iter().copied())))
    }

    fn record(
        &self,
        verb: &'static str,
        object: &ObjectDescriptor,
        backend_key: &BackendKey,
    ) -> Result<()> {
        self.calls.lock().push(format!("{verb} {} {backend_key}", object.name));
        if self.failing.lock().contains(&(object.name.clone(), verb)) {
            return Err(ExecutorError::Failed {
                object: object.name.clone(),
                verb,
                message: "rejected by backend".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Operation for RecordingBackend {
    async fn list(
        &self,
        object: &ObjectDescriptor,
    ) -> Result<Vec<BackendKeyRow>> {
        let keys = self.keys.lock().get(&object.name).cloned().unwrap_or_default();
        Ok(keys.into_iter().map(BackendKeyRow::new).collect())
    }

    async fn create(
        &self,
        object: &ObjectDescriptor,
        _key: &InstanceKey,
        backend_key: &BackendKey,
        _fields: &FieldValues,
    ) -> Result<bool> {
        self.record("create", object, backend_key)?;
        self.keys
            .lock()
            .entry(object.name.clone())
            .or_default()
            .insert(backend_key.clone());
        Ok(false)
    }

    async fn update(
        &self,
        object: &ObjectDescriptor,
        _key: &InstanceKey,
        backend_key: &BackendKey,
        _fields: &FieldValues,
    ) -> Result<bool> {
        self.record("update", object, backend_key)?;
        Ok(true)
    }

    async fn delete(
        &self,
        object: &ObjectDescriptor,
        _key: &InstanceKey,
        backend_key: &BackendKey,
    ) -> Result<bool> {
        self.record("delete", object, backend_key)?;
        if let Some(set) = self.keys.lock().get_mut(&object.name) {
            set.remove(backend_key);
        }
        Ok(false)
    }
}

pub struct TestDaemon {
    pub store: Arc<MemConfigStore>,
    pub backend: Arc<RecordingBackend>,
    pub daemon: Daemon,
}

pub fn nat_daemon() -> TestDaemon {
    let (descriptors, edges) = nat_model();
    let store = Arc::new(MemConfigStore::with_metadata(descriptors, edges));
    let backend = Arc::new(RecordingBackend::default());
    let daemon = DaemonBuilder::new(settings())
        .store(store.clone())
        .handler(OpStyle::RpcBus, backend.clone())
        .build()
        .expect("daemon builds");
    TestDaemon { store, backend, daemon }
}
