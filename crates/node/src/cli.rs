//! litefab CLI: config generation, node startup and the submitting client.
//!
//! Exit behavior is owned by `main`: every subcommand returns a Result,
//! failures print to stderr and exit 1.

use crate::broadcaster::Broadcaster;
use crate::client::Client;
use crate::committer::{spawn_commit_worker, Committer};
use crate::consensus::{Consensus, RaftConfig, RaftConsensus, SoloConsensus};
use crate::endorser::Endorser;
use crate::http::{orderer_router, peer_router, OrdererState, PeerState};
use crate::orderer::OrdererService;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use litefab_chain::{EndorsementPolicy, Identity, Msp, MspDocument, Organization, Role, TxPayload};
use litefab_common::{crypto, ClientConfig, NodeConfig};
use litefab_runtime::ChaincodeRegistry;
use litefab_storage::{LedgerStore, WorldStateStore};
use parking_lot::RwLock;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tracing::info;

/// litefab, a minimal permissioned-blockchain node runtime.
#[derive(Parser)]
#[command(
    name = "litefab",
    version,
    about = "Minimal permissioned-blockchain node runtime (execute-order-validate)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Emit a sample network: MSP document, node configs and keypairs
    GenerateConfig {
        /// Directory to write the sample network into
        dir: String,
    },

    /// Run a peer node (endorser + committer)
    StartPeer {
        /// Path to the peer's TOML config
        config: String,
    },

    /// Run an orderer node
    StartOrderer {
        /// Path to the orderer's TOML config
        config: String,
    },

    /// Client operations against a running network
    #[command(subcommand)]
    Client(ClientCommand),
}

#[derive(Subcommand)]
pub enum ClientCommand {
    /// Deploy a chaincode with an endorsement policy
    Deploy {
        chaincode_id: String,
        /// Policy literal: (ANY|ALL|MAJORITY):Org1,Org2[,...]
        policy: String,
        /// Path to the client's TOML config
        config: String,
    },

    /// Invoke a chaincode function
    Invoke {
        chaincode_id: String,
        function: String,
        /// Function arguments followed by the client config path
        #[arg(required = true, num_args = 1..)]
        args: Vec<String>,
    },

    /// Read a world-state key
    Query {
        chaincode_id: String,
        key: String,
        /// Path to the client's TOML config
        config: String,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::GenerateConfig { dir } => generate_config(&dir),
        Command::StartPeer { config } => start_peer(&config).await,
        Command::StartOrderer { config } => start_orderer(&config).await,
        Command::Client(command) => run_client(command).await,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// node startup
// ────────────────────────────────────────────────────────────────────────────

fn load_signing_key(config: &NodeConfig) -> Result<RsaPrivateKey> {
    let pem = fs::read_to_string(&config.private_key_path)
        .with_context(|| format!("reading private key {:?}", config.private_key_path))?;
    Ok(crypto::private_key_from_pem(&pem)?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown requested");
}

async fn start_peer(config_path: &str) -> Result<()> {
    let config = NodeConfig::load(config_path)?;
    let msp = Arc::new(Msp::load(&config.msp_path)?);
    let signing_key = load_signing_key(&config)?;

    let ledger = Arc::new(LedgerStore::open(&config.data_dir)?);
    let world = Arc::new(RwLock::new(WorldStateStore::open(
        &config.data_dir,
        &config.channel,
    )?));
    let registry = ChaincodeRegistry::with_builtins();

    let endorser = Arc::new(Endorser::new(
        msp.clone(),
        registry,
        world.clone(),
        signing_key,
        &config.node_id,
        &config.org_id,
    ));
    let committer = Arc::new(Committer::new(msp.clone(), ledger, world.clone()));
    let commit_queue = spawn_commit_worker(committer);

    let state = Arc::new(PeerState {
        node_id: config.node_id.clone(),
        msp,
        endorser,
        commit_queue,
        world,
        orderer_addrs: config.orderer_addrs.clone(),
        next_orderer: AtomicUsize::new(0),
        http: reqwest::Client::new(),
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(node = %config.node_id, addr = %config.listen_addr, "peer listening");
    axum::serve(listener, peer_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!(node = %config.node_id, "peer stopped cleanly");
    Ok(())
}

async fn start_orderer(config_path: &str) -> Result<()> {
    let config = NodeConfig::load(config_path)?;
    let msp = Arc::new(Msp::load(&config.msp_path)?);
    let signing_key = load_signing_key(&config)?;

    let ledger = Arc::new(LedgerStore::open(&config.data_dir)?);
    let broadcaster = Broadcaster::new(config.peer_addrs.clone());
    let core = Arc::new(OrdererService::new(
        ledger,
        signing_key,
        &config.node_id,
        broadcaster,
    ));

    let consensus: Arc<dyn Consensus> = match config.consensus.as_str() {
        "solo" => Arc::new(SoloConsensus::new(
            core.clone(),
            config.block_size,
            config.block_timeout_ms,
        )),
        "raft" => RaftConsensus::spawn(
            core.clone(),
            RaftConfig {
                peers: Vec::new(),
                block_size: config.block_size,
                block_timeout_ms: config.block_timeout_ms,
            },
        ),
        other => bail!("unknown consensus module {other:?} (expected solo or raft)"),
    };

    let state = Arc::new(OrdererState {
        node_id: config.node_id.clone(),
        msp,
        consensus,
        core,
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(node = %config.node_id, addr = %config.listen_addr, consensus = %config.consensus, "orderer listening");
    axum::serve(listener, orderer_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!(node = %config.node_id, "orderer stopped cleanly");
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// client
// ────────────────────────────────────────────────────────────────────────────

async fn run_client(command: ClientCommand) -> Result<()> {
    match command {
        ClientCommand::Deploy {
            chaincode_id,
            policy,
            config,
        } => {
            let policy: EndorsementPolicy = policy
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid policy literal: {e}"))?;
            let client = Client::from_config(ClientConfig::load(&config)?)?;
            let payload = TxPayload::deploy(&chaincode_id, vec![], policy);
            let summary = client.submit_transaction(payload).await?;
            println!(
                "deployed {} (tx {}, {} endorsement(s), status {})",
                chaincode_id, summary.tx_id, summary.endorsements, summary.status
            );
            Ok(())
        }
        ClientCommand::Invoke {
            chaincode_id,
            function,
            mut args,
        } => {
            // trailing argument is the config path
            let Some(config) = args.pop() else {
                bail!("invoke needs at least the config path after the function name");
            };
            let client = Client::from_config(ClientConfig::load(&config)?)?;
            let payload = TxPayload::invoke(&chaincode_id, &function, args);
            let summary = client.submit_transaction(payload).await?;
            println!(
                "invoked {}.{} (tx {}, {} endorsement(s), status {})",
                chaincode_id, function, summary.tx_id, summary.endorsements, summary.status
            );
            Ok(())
        }
        ClientCommand::Query {
            chaincode_id: _,
            key,
            config,
        } => {
            let client = Client::from_config(ClientConfig::load(&config)?)?;
            match client.query(&key).await? {
                Some(value) => println!("{value}"),
                None => println!("null"),
            }
            Ok(())
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// generate-config
// ────────────────────────────────────────────────────────────────────────────

struct SampleIdentity {
    id: &'static str,
    org_id: &'static str,
    role: Role,
}

const SAMPLE_IDENTITIES: &[SampleIdentity] = &[
    SampleIdentity { id: "Org1Client", org_id: "Org1", role: Role::Client },
    SampleIdentity { id: "Org1Peer", org_id: "Org1", role: Role::Peer },
    SampleIdentity { id: "Org2Client", org_id: "Org2", role: Role::Client },
    SampleIdentity { id: "Org2Peer", org_id: "Org2", role: Role::Peer },
    SampleIdentity { id: "Orderer1", org_id: "OrdererOrg", role: Role::Orderer },
];

/// Write a ready-to-run two-org sample network: keypairs, MSP document,
/// peer/orderer/client configs.
fn generate_config(dir: &str) -> Result<()> {
    let root = Path::new(dir);
    let keys_dir = root.join("keys");
    fs::create_dir_all(&keys_dir)?;

    let mut orgs: Vec<Organization> = Vec::new();
    for sample in SAMPLE_IDENTITIES {
        info!(id = sample.id, "generating keypair");
        let private_key = crypto::generate_keypair()?;
        let private_pem = crypto::private_key_to_pem(&private_key)?;
        let public_pem = crypto::public_key_to_pem(&RsaPublicKey::from(&private_key))?;
        fs::write(keys_dir.join(format!("{}.pem", sample.id)), private_pem)?;

        let identity = Identity {
            id: sample.id.to_string(),
            org_id: sample.org_id.to_string(),
            role: sample.role,
            public_key: public_pem.clone(),
        };
        match orgs.iter_mut().find(|o| o.org_id == sample.org_id) {
            Some(org) => {
                org.root_public_keys.push(public_pem);
                org.identities.push(identity);
            }
            None => orgs.push(Organization {
                org_id: sample.org_id.to_string(),
                root_public_keys: vec![public_pem],
                identities: vec![identity],
            }),
        }
    }

    let msp_path = root.join("msp.json");
    fs::write(
        &msp_path,
        serde_json::to_string_pretty(&MspDocument { orgs })?,
    )?;

    let key_path = |id: &str| {
        keys_dir
            .join(format!("{id}.pem"))
            .to_string_lossy()
            .into_owned()
    };
    let msp = msp_path.to_string_lossy().into_owned();
    let peer_addrs = vec![
        "http://127.0.0.1:7051".to_string(),
        "http://127.0.0.1:7052".to_string(),
    ];
    let orderer_addrs = vec!["http://127.0.0.1:7050".to_string()];

    let peer = |node_id: &str, org_id: &str, port: u16, data: &str| NodeConfig {
        node_id: node_id.to_string(),
        org_id: org_id.to_string(),
        listen_addr: format!("127.0.0.1:{port}"),
        data_dir: root.join(data).to_string_lossy().into_owned(),
        channel: "default".to_string(),
        msp_path: msp.clone(),
        private_key_path: key_path(node_id),
        orderer_addrs: orderer_addrs.clone(),
        peer_addrs: vec![],
        consensus: "solo".to_string(),
        block_size: litefab_common::config::DEFAULT_BLOCK_SIZE,
        block_timeout_ms: litefab_common::config::DEFAULT_BLOCK_TIMEOUT_MS,
    };
    fs::write(
        root.join("peer1.toml"),
        toml::to_string_pretty(&peer("Org1Peer", "Org1", 7051, "data/peer1"))?,
    )?;
    fs::write(
        root.join("peer2.toml"),
        toml::to_string_pretty(&peer("Org2Peer", "Org2", 7052, "data/peer2"))?,
    )?;

    let mut orderer = peer("Orderer1", "OrdererOrg", 7050, "data/orderer1");
    orderer.orderer_addrs = vec![];
    orderer.peer_addrs = peer_addrs.clone();
    fs::write(root.join("orderer1.toml"), toml::to_string_pretty(&orderer)?)?;

    let client = ClientConfig {
        client_id: "Org1Client".to_string(),
        org_id: "Org1".to_string(),
        private_key_path: key_path("Org1Client"),
        peer_addrs,
        orderer_addrs,
        request_timeout_ms: 5000,
    };
    fs::write(root.join("client.toml"), toml::to_string_pretty(&client)?)?;

    println!("sample network written to {dir}");
    println!("  msp.json            network MSP document");
    println!("  keys/               private keys (PKCS#8 PEM)");
    println!("  peer1.toml          Org1Peer on 127.0.0.1:7051");
    println!("  peer2.toml          Org2Peer on 127.0.0.1:7052");
    println!("  orderer1.toml       Orderer1 on 127.0.0.1:7050");
    println!("  client.toml         Org1Client");
    Ok(())
}
