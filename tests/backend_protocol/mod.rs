use std::collections::BTreeSet;
use std::sync::Arc;

use cfgmgr::BackendEndpoint;
use cfgmgr::BackendKey;
use cfgmgr::DaemonBuilder;
use cfgmgr::ErrorCode;
use cfgmgr::InstanceKey;
use cfgmgr::MemConfigStore;
use cfgmgr::ObjectDescriptor;
use cfgmgr::OpStyle;
use cfgmgr::ProtocolOperation;
use cfgmgr::ProtocolReply;
use cfgmgr::ProtocolRequest;
use cfgmgr::RequestKind;
use cfgmgr::Sequenced;
use cfgmgr::SequencedChannel;
use cfgmgr::VerbStyles;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::fields;
use crate::common::key;
use crate::common::settings;
use crate::enable_logger;

const CHAIN: &str = "Device.Firewall.Chain";
const FIREWALL_BACKEND: &str = "fwd";

fn chain() -> ObjectDescriptor {
    ObjectDescriptor::new(CHAIN, &["i"])
        .with_params(&["Name", "Policy"])
        .with_backend(FIREWALL_BACKEND, VerbStyles::uniform(OpStyle::BackendProtocol))
        .with_backend_key(&["Name"])
}

/// Firewall daemon double: keeps chains by name, refuses the chain named
/// `reserved`, and reports when it was asked to restart.
fn firewall(
    mut endpoint: BackendEndpoint<ProtocolRequest, ProtocolReply>,
    initial: &[&str],
) -> JoinHandle<BTreeSet<BackendKey>> {
    let mut chains: BTreeSet<BackendKey> = initial.iter().map(|n| BackendKey::new([*n])).collect();
    tokio::spawn(async move {
        while let Some(Sequenced { seq, body }) = endpoint.requests.recv().await {
            let reply = match body {
                ProtocolRequest::List { .. } => ProtocolReply::Keys(chains.iter().cloned().collect()),
                ProtocolRequest::Create { backend_key, .. } if backend_key.to_string() == "reserved" => {
                    ProtocolReply::Failed("chain name reserved".to_string())
                }
                ProtocolRequest::Create { backend_key, .. } => {
                    chains.insert(backend_key);
                    ProtocolReply::Done { restart: false }
                }
                ProtocolRequest::Update { .. } => ProtocolReply::Done { restart: true },
                ProtocolRequest::Delete { backend_key, .. } => {
                    chains.remove(&backend_key);
                    ProtocolReply::Done { restart: false }
                }
            };
            if endpoint.replies.send(Sequenced { seq, body: reply }).await.is_err() {
                break;
            }
        }
        chains
    })
}

fn add_chain(name: &str) -> RequestKind {
    RequestKind::AddObject {
        object: CHAIN.to_string(),
        parent_key: InstanceKey::root(),
        fields: fields(&[("Name", name), ("Policy", "DROP")]),
    }
}

#[tokio::test]
async fn protocol_backend_serves_daemon_requests() {
    enable_logger();
    let settings = settings();
    let (channel, endpoint) = SequencedChannel::new(FIREWALL_BACKEND, &settings.backend);
    let backend = firewall(endpoint, &["INPUT"]);

    let store = Arc::new(MemConfigStore::with_metadata(vec![chain()], Vec::new()));
    let daemon = DaemonBuilder::new(settings)
        .store(store.clone())
        .handler(OpStyle::BackendProtocol, Arc::new(ProtocolOperation::new(channel)))
        .build()
        .unwrap();
    let dispatcher = daemon.dispatcher();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(daemon.run(shutdown.clone()));

    let added = dispatcher.call(1, 7, add_chain("WAN_IN")).await.unwrap();
    assert!(added.is_ok(), "{:?}", added.message);
    assert_eq!(added.new_key, Some(key(&[1])));

    let refused = dispatcher.call(2, 7, add_chain("reserved")).await.unwrap();
    assert_eq!(refused.code, ErrorCode::ExecutorFailure);
    assert_eq!(store.row_count(&chain()), 1);

    let set = dispatcher
        .call(
            3,
            7,
            RequestKind::SetValue {
                object: CHAIN.to_string(),
                key: key(&[1]),
                fields: fields(&[("Policy", "ACCEPT")]),
            },
        )
        .await
        .unwrap();
    assert!(set.restart_backends.contains(FIREWALL_BACKEND));

    // INPUT only exists in the backend and is adopted by discover
    let discovered = dispatcher
        .call(4, 7, RequestKind::DiscoverConfig { objects: vec![CHAIN.to_string()] })
        .await
        .unwrap();
    let report = discovered.discover.unwrap();
    assert_eq!(report.reports[0].added_to_db.succeeded, 1);
    assert_eq!(store.row_count(&chain()), 2);

    shutdown.cancel();
    running.await.unwrap().unwrap();

    let chains = backend.await.unwrap();
    let names: Vec<String> = chains.iter().map(ToString::to_string).collect();
    assert_eq!(names, vec!["INPUT".to_string(), "WAN_IN".to_string()]);
}
