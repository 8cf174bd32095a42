//! Full HTTP round trip on ephemeral ports: client → peer `/submit`
//! (forwarded to the orderer) → block cut → broadcast back to the peer →
//! commit → `/query`.

mod common;

use litefab_chain::TxPayload;
use litefab_common::{crypto, ClientConfig};
use litefab_node::consensus::{Consensus, SoloConsensus};
use litefab_node::http::{orderer_router, peer_router, OrdererState, PeerState};
use litefab_node::{spawn_commit_worker, Broadcaster, Client, Committer, Endorser, OrdererService};
use litefab_runtime::ChaincodeRegistry;
use litefab_storage::{LedgerStore, WorldStateStore};
use parking_lot::RwLock;
use std::future::IntoFuture;
use std::io::Write;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

struct HttpNet {
    _peer_dir: tempfile::TempDir,
    _orderer_dir: tempfile::TempDir,
    _key_file: tempfile::NamedTempFile,
    peer_addr: String,
    client: Client,
}

impl HttpNet {
    async fn start() -> Self {
        let keys = common::keys();
        let msp = Arc::new(common::test_msp());

        // bind both listeners first so each side knows the other's address
        let peer_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind peer");
        let orderer_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind orderer");
        let peer_addr = format!("http://{}", peer_listener.local_addr().expect("peer addr"));
        let orderer_addr = format!(
            "http://{}",
            orderer_listener.local_addr().expect("orderer addr")
        );

        // peer side
        let peer_dir = tempfile::tempdir().expect("peer tempdir");
        let world = Arc::new(RwLock::new(
            WorldStateStore::open(peer_dir.path(), "default").expect("world state"),
        ));
        let peer_ledger = Arc::new(LedgerStore::open(peer_dir.path()).expect("peer ledger"));
        let endorser = Arc::new(Endorser::new(
            msp.clone(),
            ChaincodeRegistry::with_builtins(),
            world.clone(),
            keys.peer1.clone(),
            "Org1Peer",
            "Org1",
        ));
        let committer = Arc::new(Committer::new(msp.clone(), peer_ledger, world.clone()));
        let peer_state = Arc::new(PeerState {
            node_id: "Org1Peer".to_string(),
            msp: msp.clone(),
            endorser,
            commit_queue: spawn_commit_worker(committer),
            world,
            orderer_addrs: vec![orderer_addr],
            next_orderer: AtomicUsize::new(0),
            http: reqwest::Client::new(),
        });
        tokio::spawn(axum::serve(peer_listener, peer_router(peer_state)).into_future());

        // orderer side, cutting a block per envelope and broadcasting to the peer
        let orderer_dir = tempfile::tempdir().expect("orderer tempdir");
        let orderer_ledger = Arc::new(LedgerStore::open(orderer_dir.path()).expect("ledger"));
        let core = Arc::new(OrdererService::new(
            orderer_ledger,
            keys.orderer.clone(),
            "Orderer1",
            Broadcaster::new(vec![peer_addr.clone()]),
        ));
        let consensus: Arc<dyn Consensus> = Arc::new(SoloConsensus::new(core.clone(), 1, 2000));
        let orderer_state = Arc::new(OrdererState {
            node_id: "Orderer1".to_string(),
            msp,
            consensus,
            core,
        });
        tokio::spawn(axum::serve(orderer_listener, orderer_router(orderer_state)).into_future());

        // client submits through the peer, which forwards to the orderer
        let mut key_file = tempfile::NamedTempFile::new().expect("key file");
        let pem = crypto::private_key_to_pem(&keys.client1).expect("pem");
        write!(key_file, "{}", pem).expect("write key");
        let client = Client::from_config(ClientConfig {
            client_id: "Org1Client".to_string(),
            org_id: "Org1".to_string(),
            private_key_path: key_file.path().to_string_lossy().into_owned(),
            peer_addrs: vec![peer_addr.clone()],
            orderer_addrs: vec![peer_addr.clone()],
            request_timeout_ms: 5000,
        })
        .expect("client");

        Self {
            _peer_dir: peer_dir,
            _orderer_dir: orderer_dir,
            _key_file: key_file,
            peer_addr,
            client,
        }
    }
}

#[tokio::test]
async fn deploy_mint_query_over_http() {
    let net = HttpNet::start().await;

    let summary = net
        .client
        .submit_transaction(TxPayload::deploy(
            "basic",
            vec![],
            "ANY:Org1".parse().expect("policy"),
        ))
        .await
        .expect("deploy");
    assert_eq!(summary.endorsements, 1);
    assert_eq!(net.client.query("totalSupply").await.expect("query"), Some("0".to_string()));

    net.client
        .submit_transaction(TxPayload::invoke(
            "basic",
            "mint",
            vec!["500".into(), "Alice".into()],
        ))
        .await
        .expect("mint");
    assert_eq!(
        net.client.query("balance:Alice").await.expect("query"),
        Some("500".to_string())
    );
    assert_eq!(
        net.client.query("totalSupply").await.expect("query"),
        Some("500".to_string())
    );
    assert_eq!(net.client.query("balance:Bob").await.expect("query"), None);
}

#[tokio::test]
async fn query_without_key_is_bad_request() {
    let net = HttpNet::start().await;
    let resp = reqwest::get(format!("{}/query", net.peer_addr))
        .await
        .expect("request");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let health = reqwest::get(format!("{}/health", net.peer_addr))
        .await
        .expect("request");
    assert_eq!(health.status(), reqwest::StatusCode::OK);
}
