use std::sync::Arc;

use super::FakeBackend;
use crate::CascadeConfig;
use crate::CascadeEngine;
use crate::ConfigStore;
use crate::DependencyClass;
use crate::DependencyEdge;
use crate::LockOwner;
use crate::MemConfigStore;
use crate::MetadataCatalog;
use crate::ObjectDescriptor;
use crate::OpStyle;
use crate::OperationRouter;
use crate::ReconcileEngine;
use crate::RequestProcessor;
use crate::VerbStyles;
use crate::WriteKind;
use crate::WriteLockArbiter;
use crate::WriteLockGuard;

pub const WIFI_BACKEND: &str = "wifid";
pub const NET_BACKEND: &str = "netd";

fn chain_object(level: usize) -> String {
    (0..=level).fold("Device".to_string(), |name, l| format!("{name}.L{l}"))
}

/// Objects `Device.L0`, `Device.L0.L1`, ... each keyed one index deeper
/// than the previous, linked by AutoCreate and AutoDelete edges from the
/// parent's last index to the child's `Ref` field.
pub fn chain_model(levels: usize) -> (Vec<ObjectDescriptor>, Vec<DependencyEdge>) {
    let mut descriptors = Vec::new();
    let mut edges = Vec::new();
    for level in 0..=levels {
        let index_params: Vec<String> = (0..=level).map(|l| format!("i{l}")).collect();
        let index_refs: Vec<&str> = index_params.iter().map(String::as_str).collect();
        let mut d = ObjectDescriptor::new(chain_object(level), &index_refs).with_params(&["Ref"]);
        if level > 0 {
            let parent = chain_object(level - 1);
            let parent_param = format!("i{}", level - 1);
            let child = chain_object(level);
            d = d.with_parent(parent.clone());
            for class in [DependencyClass::AutoCreate, DependencyClass::AutoDelete] {
                edges.push(DependencyEdge::new(
                    class,
                    (parent.as_str(), parent_param.as_str()),
                    (child.as_str(), "Ref"),
                ));
            }
        }
        descriptors.push(d);
    }
    (descriptors, edges)
}

pub fn chain_name(level: usize) -> String {
    chain_object(level)
}

/// A radio with two auto-created children on the wifi backend:
/// `Stats` (store-only) and `Channel` (pushed over the RPC bus).
pub fn wifi_model() -> (Vec<ObjectDescriptor>, Vec<DependencyEdge>) {
    let radio = ObjectDescriptor::new("Device.WiFi.Radio", &["i"]).with_params(&["Name"]);
    let stats = ObjectDescriptor::new("Device.WiFi.Radio.Stats", &["i", "j"])
        .with_params(&["RadioRef", "Enable"])
        .with_parent("Device.WiFi.Radio")
        .with_default("Enable", "true");
    let channel = ObjectDescriptor::new("Device.WiFi.Radio.Channel", &["i", "j"])
        .with_params(&["RadioRef"])
        .with_parent("Device.WiFi.Radio")
        .with_backend(WIFI_BACKEND, VerbStyles::uniform(OpStyle::RpcBus));

    let edges = vec![
        DependencyEdge::new(
            DependencyClass::AutoCreate,
            ("Device.WiFi.Radio", "i"),
            ("Device.WiFi.Radio.Stats", "RadioRef"),
        ),
        DependencyEdge::new(
            DependencyClass::AutoCreate,
            ("Device.WiFi.Radio", "i"),
            ("Device.WiFi.Radio.Channel", "RadioRef"),
        ),
        DependencyEdge::new(
            DependencyClass::AutoDelete,
            ("Device.WiFi.Radio", "i"),
            ("Device.WiFi.Radio.Stats", "RadioRef"),
        ),
        DependencyEdge::new(
            DependencyClass::AutoDelete,
            ("Device.WiFi.Radio", "i"),
            ("Device.WiFi.Radio.Channel", "RadioRef"),
        ),
    ];
    (vec![radio, stats, channel], edges)
}

/// Network objects owned by the `netd` backend, matched by name/address.
pub fn interface_model() -> (Vec<ObjectDescriptor>, Vec<DependencyEdge>) {
    let styles = VerbStyles::uniform(OpStyle::RpcBus);
    let interface = ObjectDescriptor::new("Device.IP.Interface", &["i"])
        .with_params(&["Name", "Enable"])
        .with_backend(NET_BACKEND, styles)
        .with_backend_key(&["Name"]);
    let address = ObjectDescriptor::new("Device.IP.Interface.IPv4Address", &["i", "j"])
        .with_params(&["IPAddress"])
        .with_parent("Device.IP.Interface")
        .with_backend(NET_BACKEND, styles)
        .with_backend_key(&["IPAddress"]);
    let host = ObjectDescriptor::new("Device.Hosts.Host", &["i"])
        .with_params(&["MACAddress", "Alias"])
        .with_backend(NET_BACKEND, styles)
        .with_backend_key(&["MACAddress"])
        .read_only();
    let info = ObjectDescriptor::new("Device.DeviceInfo", &[])
        .with_params(&["HostName"])
        .with_backend(NET_BACKEND, styles);
    (vec![interface, address, host, info], Vec::new())
}

/// Store, catalog, router and lock wired together over a [`FakeBackend`]
/// that serves every non-store operation style.
pub struct TestHarness {
    pub store: Arc<MemConfigStore>,
    pub catalog: Arc<MetadataCatalog>,
    pub backend: Arc<FakeBackend>,
    pub executor: Arc<OperationRouter>,
    pub lock: Arc<WriteLockArbiter>,
}

impl TestHarness {
    pub fn new(model: (Vec<ObjectDescriptor>, Vec<DependencyEdge>)) -> Self {
        let (descriptors, edges) = model;
        let store = Arc::new(MemConfigStore::with_metadata(descriptors, edges));
        let catalog = Arc::new(MetadataCatalog::load(store.as_ref()).expect("catalog loads"));
        let backend = Arc::new(FakeBackend::new());

        let mut router = OperationRouter::new(store.clone() as Arc<dyn ConfigStore>);
        for style in [OpStyle::ConfigTool, OpStyle::RpcBus, OpStyle::Script, OpStyle::BackendProtocol] {
            router = router.with_handler(style, backend.clone());
        }

        Self {
            store,
            catalog,
            backend,
            executor: Arc::new(router),
            lock: Arc::new(WriteLockArbiter::with_budget(
                std::time::Duration::from_millis(100),
                std::time::Duration::from_millis(50),
            )),
        }
    }

    pub fn descriptor(
        &self,
        name: &str,
    ) -> Arc<ObjectDescriptor> {
        self.catalog.descriptor(name).expect("descriptor in catalog")
    }

    pub async fn guard(&self) -> WriteLockGuard {
        self.lock
            .acquire(WriteKind::AddObject, LockOwner::new(1, 1, 1))
            .await
            .expect("lock is free")
    }

    pub fn cascade(
        &self,
        max_depth: usize,
    ) -> CascadeEngine {
        CascadeEngine::new(
            self.catalog.clone(),
            self.store.clone(),
            self.executor.clone(),
            &CascadeConfig { max_depth },
        )
    }

    pub fn reconciler(&self) -> ReconcileEngine {
        ReconcileEngine::new(self.catalog.clone(), self.store.clone(), self.executor.clone())
    }

    pub fn processor(
        &self,
        max_depth: usize,
    ) -> RequestProcessor {
        RequestProcessor::new(
            self.catalog.clone(),
            self.store.clone(),
            self.executor.clone(),
            self.lock.clone(),
            &CascadeConfig { max_depth },
        )
    }
}
