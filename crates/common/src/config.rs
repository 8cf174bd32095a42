//! Node and client configuration, loaded from TOML files.
//!
//! Private keys are referenced by path, never embedded. Paths are resolved
//! relative to the process working directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_BLOCK_SIZE: usize = 10;
pub const DEFAULT_BLOCK_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_CHANNEL: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_block_timeout_ms() -> u64 {
    DEFAULT_BLOCK_TIMEOUT_MS
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_consensus() -> String {
    "solo".to_string()
}

/// Configuration for a peer or orderer node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identity id of this node in the MSP (e.g. "Org1Peer").
    pub node_id: String,

    /// Organization the node identity belongs to.
    pub org_id: String,

    /// Bind address, e.g. "127.0.0.1:7051".
    pub listen_addr: String,

    /// Data directory; `ledger/` and `worldstate/` stores live underneath.
    pub data_dir: String,

    /// Channel namespace for world-state keys.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Path to the network MSP document (JSON).
    pub msp_path: String,

    /// Path to this node's private key (PKCS#8 PEM).
    pub private_key_path: String,

    /// Orderer addresses a peer forwards envelopes to (round-robin).
    #[serde(default)]
    pub orderer_addrs: Vec<String>,

    /// Peer addresses an orderer broadcasts committed blocks to.
    #[serde(default)]
    pub peer_addrs: Vec<String>,

    /// Consensus module for an orderer: "solo" (default) or "raft".
    #[serde(default = "default_consensus")]
    pub consensus: String,

    /// Solo consensus: cut a block once this many envelopes are pending.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Solo consensus: cut whatever is pending after this many milliseconds.
    #[serde(default = "default_block_timeout_ms")]
    pub block_timeout_ms: u64,
}

impl NodeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: NodeConfig = toml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.is_empty() {
            return Err(ConfigError::Invalid("node_id cannot be empty".into()));
        }
        if self.listen_addr.is_empty() {
            return Err(ConfigError::Invalid("listen_addr cannot be empty".into()));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Configuration for the submitting client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Identity id of the client in the MSP (e.g. "Org1Client").
    pub client_id: String,

    /// Organization the client identity belongs to.
    pub org_id: String,

    /// Path to the client's private key (PKCS#8 PEM).
    pub private_key_path: String,

    /// Endorsing peers to send proposals to. All are asked; responses are
    /// collected to satisfy the endorsement policy.
    pub peer_addrs: Vec<String>,

    /// Orderers to submit envelopes to, tried in order.
    pub orderer_addrs: Vec<String>,

    /// Request timeout for peer/orderer calls, in milliseconds.
    #[serde(default = "default_block_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: ClientConfig = toml::from_str(&raw)?;
        if cfg.peer_addrs.is_empty() {
            return Err(ConfigError::Invalid("peer_addrs cannot be empty".into()));
        }
        Ok(cfg)
    }
}
