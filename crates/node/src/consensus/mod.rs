//! Pluggable consensus: the capability an orderer frontend needs is just
//! `submit_tx`. Variants are composed around the [`OrdererService`] core
//! rather than inheriting from it.

pub mod raft;
pub mod solo;

pub use raft::{RaftConfig, RaftConsensus, RaftRole};
pub use solo::SoloConsensus;

use crate::error::NodeError;
use async_trait::async_trait;
use litefab_chain::TransactionEnvelope;

#[async_trait]
pub trait Consensus: Send + Sync {
    /// Accept a verified envelope for ordering.
    async fn submit_tx(&self, envelope: TransactionEnvelope) -> Result<(), NodeError>;
}
