use std::sync::Arc;

use cfgmgr::init_sled_config_db;
use cfgmgr::ConfigStore;
use cfgmgr::DaemonBuilder;
use cfgmgr::DependencyClass;
use cfgmgr::DependencyEdge;
use cfgmgr::InstanceKey;
use cfgmgr::ObjectDescriptor;
use cfgmgr::OpStyle;
use cfgmgr::Owner;
use cfgmgr::RequestKind;
use cfgmgr::SledConfigStore;
use tokio_util::sync::CancellationToken;

use crate::common::fields;
use crate::common::key;
use crate::common::nat_model;
use crate::common::settings;
use crate::common::RecordingBackend;
use crate::common::FIREWALL_RULE;
use crate::common::PORT_MAPPING;
use crate::enable_logger;

fn open(dir: &std::path::Path) -> SledConfigStore {
    SledConfigStore::new(init_sled_config_db(dir).unwrap()).unwrap()
}

fn descriptor(name: &str) -> ObjectDescriptor {
    nat_model().0.into_iter().find(|d| d.name == name).unwrap()
}

#[tokio::test]
async fn instances_survive_a_daemon_restart() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let (descriptors, edges) = nat_model();
    {
        let store = open(dir.path());
        for d in &descriptors {
            store.put_descriptor(d).unwrap();
        }
        for e in &edges {
            store.put_edge(e).unwrap();
        }
    }

    let store = Arc::new(open(dir.path()));
    let backend = Arc::new(RecordingBackend::default());
    let mut settings = settings();
    settings.storage.db_root_dir = dir.path().to_path_buf();
    let daemon = DaemonBuilder::new(settings)
        .store(store.clone())
        .handler(OpStyle::RpcBus, backend.clone())
        .build()
        .unwrap();
    let dispatcher = daemon.dispatcher();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(daemon.run(shutdown.clone()));

    let added = dispatcher
        .call(
            1,
            3,
            RequestKind::AddObject {
                object: PORT_MAPPING.to_string(),
                parent_key: InstanceKey::root(),
                fields: fields(&[("ExternalPort", "8080"), ("InternalClient", "10.0.0.2")]),
            },
        )
        .await
        .unwrap();
    assert!(added.is_ok(), "{:?}", added.message);

    shutdown.cancel();
    running.await.unwrap().unwrap();
    store.flush().unwrap();
    drop(store);

    let reopened = open(dir.path());
    assert_eq!(reopened.load_descriptors().unwrap().len(), descriptors.len());
    let edge_count = reopened
        .load_edges()
        .unwrap()
        .iter()
        .filter(|e: &&DependencyEdge| e.class == DependencyClass::AutoCreate)
        .count();
    assert_eq!(edge_count, 2);

    let mappings = reopened
        .fetch_db_keys(&descriptor(PORT_MAPPING), &InstanceKey::root())
        .unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].key, key(&[1]));
    assert_eq!(mappings[0].backend_key.to_string(), "8080");
    assert_eq!(mappings[0].create_owner, Owner::User);

    let rule = descriptor(FIREWALL_RULE);
    assert_eq!(
        reopened.field_value(&rule, &key(&[1, 1]), "Target").unwrap().as_deref(),
        Some("ACCEPT")
    );
}
