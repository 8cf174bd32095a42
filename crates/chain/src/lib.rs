//! # Litefab Chain Crate
//!
//! The wire and ledger data model: transaction payloads, read/write sets,
//! proposals, envelopes, blocks, validation codes, endorsement policies and
//! the membership service provider (MSP).
//!
//! Every signed payload is built through [`litefab_common::canonical_json`],
//! which is the single interop invariant of the protocol.

pub mod block;
pub mod msp;
pub mod policy;
pub mod tx;
pub mod types;

pub use block::{Block, BlockHeader, BlockMetadata, ValidationInfo};
pub use msp::{Identity, Msp, MspDocument, MspError, Organization, VerifyOutcome};
pub use policy::{EndorsementPolicy, PolicyType};
pub use tx::{
    endorsement_signing_bytes, Endorsement, Proposal, ProposalResponse, ReadEntry, RwSet,
    TransactionEnvelope, TxPayload, TxType, WriteEntry,
};
pub use types::{ChaincodeMetadata, Role, ValidationCode, Version};

use thiserror::Error;

/// Failures while assembling or digesting chain entities.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Canonical(#[from] litefab_common::CanonicalError),
}
