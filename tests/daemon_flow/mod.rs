use std::time::Duration;

use cfgmgr::ConfigStore;
use cfgmgr::ErrorCode;
use cfgmgr::InstanceKey;
use cfgmgr::ObjectDescriptor;
use cfgmgr::Owner;
use cfgmgr::RequestKind;
use tokio_util::sync::CancellationToken;

use crate::common::fields;
use crate::common::key;
use crate::common::nat_daemon;
use crate::common::nat_model;
use crate::common::FIREWALL_RULE;
use crate::common::NAT_BACKEND;
use crate::common::PORT_MAPPING;
use crate::common::QOS_CLASS;
use crate::enable_logger;

fn descriptor(name: &str) -> ObjectDescriptor {
    let (descriptors, _) = nat_model();
    descriptors
        .into_iter()
        .find(|d| d.name == name)
        .expect("object in model")
}

fn add_mapping(port: &str) -> RequestKind {
    RequestKind::AddObject {
        object: PORT_MAPPING.to_string(),
        parent_key: InstanceKey::root(),
        fields: fields(&[("ExternalPort", port), ("InternalClient", "192.168.1.10")]),
    }
}

#[tokio::test]
async fn add_set_get_delete_round_through_the_daemon() {
    enable_logger();
    let t = nat_daemon();
    let dispatcher = t.daemon.dispatcher();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(t.daemon.run(shutdown.clone()));

    // add cascades into the rule and the QoS class
    let added = dispatcher.call(1, 10, add_mapping("8080")).await.unwrap();
    assert!(added.is_ok(), "{:?}", added.message);
    assert_eq!(added.new_key, Some(key(&[1])));
    assert_eq!(added.cascade.as_ref().unwrap().created.len(), 2);
    assert!(t.backend.has(FIREWALL_RULE, &["8080", "1"]));
    assert_eq!(
        t.backend.calls(),
        vec![
            format!("create {PORT_MAPPING} 8080"),
            format!("create {FIREWALL_RULE} 8080/1"),
        ]
    );
    let rule = t.store.row(&descriptor(FIREWALL_RULE), &key(&[1, 1])).unwrap();
    assert_eq!(rule.fields, fields(&[("MappingRef", "1"), ("Target", "ACCEPT")]));

    // set marks the mapping as user configured and asks for a restart
    let set = dispatcher
        .call(
            2,
            10,
            RequestKind::SetValue {
                object: PORT_MAPPING.to_string(),
                key: key(&[1]),
                fields: fields(&[("InternalClient", "192.168.1.20")]),
            },
        )
        .await
        .unwrap();
    assert!(set.is_ok(), "{:?}", set.message);
    assert!(set.restart_backends.contains(NAT_BACKEND));

    let got = dispatcher
        .call(
            3,
            11,
            RequestKind::GetValue {
                object: PORT_MAPPING.to_string(),
                key: key(&[1]),
                params: vec!["InternalClient".to_string()],
            },
        )
        .await
        .unwrap();
    assert_eq!(got.values, fields(&[("InternalClient", "192.168.1.20")]));

    // delete removes dependents first, the mapping last
    let deleted = dispatcher
        .call(
            4,
            10,
            RequestKind::DeleteObject {
                object: PORT_MAPPING.to_string(),
                key: key(&[1]),
            },
        )
        .await
        .unwrap();
    assert!(deleted.is_ok(), "{:?}", deleted.message);
    let order: Vec<String> = deleted.cascade.unwrap().deleted.into_iter().map(|(o, _)| o).collect();
    assert_eq!(order.last().map(String::as_str), Some(PORT_MAPPING));
    for object in [PORT_MAPPING, FIREWALL_RULE, QOS_CLASS] {
        assert_eq!(t.store.row_count(&descriptor(object)), 0);
    }
    assert!(!t.backend.has(PORT_MAPPING, &["8080"]));

    shutdown.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn failed_dependent_keeps_completed_siblings() {
    enable_logger();
    let t = nat_daemon();
    t.backend.fail(FIREWALL_RULE, "create");
    let dispatcher = t.daemon.dispatcher();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(t.daemon.run(shutdown.clone()));

    let response = dispatcher.call(1, 10, add_mapping("443")).await.unwrap();

    assert_eq!(response.code, ErrorCode::ExecutorFailure);
    assert_eq!(response.new_key, Some(key(&[1])));
    assert!(response.cascade.unwrap().created.is_empty());
    assert_eq!(t.store.row_count(&descriptor(PORT_MAPPING)), 1);
    assert_eq!(t.store.row_count(&descriptor(FIREWALL_RULE)), 0);

    shutdown.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn hold_window_rejects_then_clears() {
    enable_logger();
    let t = nat_daemon();
    let dispatcher = t.daemon.dispatcher();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(t.daemon.run(shutdown.clone()));

    dispatcher
        .set_hold("firmware upgrade", Some(Duration::from_secs(300)), "upgrader")
        .unwrap();
    let err = dispatcher.call(1, 10, add_mapping("22")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Held);

    assert!(dispatcher.clear_hold("upgrader").unwrap());
    let response = dispatcher.call(2, 10, add_mapping("22")).await.unwrap();
    assert!(response.is_ok());

    shutdown.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn discover_adopts_backend_only_instances() {
    enable_logger();
    let t = nat_daemon();
    t.backend.seed(PORT_MAPPING, &["25"]);
    t.backend.seed(FIREWALL_RULE, &["25", "1"]);
    let dispatcher = t.daemon.dispatcher();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(t.daemon.run(shutdown.clone()));

    let added = dispatcher.call(1, 10, add_mapping("8443")).await.unwrap();
    assert!(added.is_ok());
    let discovered = dispatcher
        .call(2, 10, RequestKind::DiscoverConfig { objects: Vec::new() })
        .await
        .unwrap();
    assert!(discovered.is_ok(), "{:?}", discovered.message);

    let report = discovered.discover.unwrap();
    assert!(report.failed_objects.is_empty());
    let mapping = report.reports.iter().find(|r| r.object == PORT_MAPPING).unwrap();
    assert_eq!(mapping.added_to_db.succeeded, 1);
    assert_eq!(mapping.updated_backend.succeeded, 1);
    let rule = report.reports.iter().find(|r| r.object == FIREWALL_RULE).unwrap();
    assert_eq!(rule.added_to_db.succeeded, 1);

    let mappings = t
        .store
        .fetch_db_keys(&descriptor(PORT_MAPPING), &InstanceKey::root())
        .unwrap();
    assert_eq!(mappings.len(), 2);
    let adopted = mappings.iter().find(|r| r.backend_key.to_string() == "25").unwrap();
    assert_eq!(adopted.create_owner, Owner::System);

    shutdown.cancel();
    running.await.unwrap().unwrap();
}
