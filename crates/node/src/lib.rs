//! # Litefab Node Crate
//!
//! The node runtime: endorser and committer on the peer side, the orderer
//! with its pluggable consensus modules, the block broadcaster, the
//! submitting client and the HTTP surface.
//!
//! Data flow through the network:
//! client → proposal → endorser → rwset + endorsement → client →
//! envelope → orderer → block → committer → ledger + world state.

pub mod broadcaster;
pub mod cli;
pub mod client;
pub mod committer;
pub mod consensus;
pub mod endorser;
pub mod error;
pub mod http;
pub mod orderer;

pub use broadcaster::Broadcaster;
pub use client::Client;
pub use committer::{spawn_commit_worker, CommitSender, Committer};
pub use endorser::Endorser;
pub use error::NodeError;
pub use orderer::OrdererService;
