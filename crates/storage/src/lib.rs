//! # Litefab Storage Crate
//!
//! Durable stores backing the commit pipeline:
//! - [`LedgerStore`]: append-only block log with hash and tx indexes
//! - [`WorldStateStore`]: versioned key-value world state with MVCC
//!   read-set validation
//!
//! Both are LMDB environments under the node data directory (`ledger/` and
//! `worldstate/`). Multi-key updates always go through a single write
//! transaction, so a reader never observes a half-written block or a state
//! entry without its version.

pub mod ledger;
pub mod world_state;

pub use ledger::LedgerStore;
pub use world_state::WorldStateStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("lmdb error: {0}")]
    Lmdb(#[from] lmdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("value encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("digest error: {0}")]
    Digest(String),

    #[error("corrupt store entry: {0}")]
    Corrupt(String),
}

impl From<litefab_chain::ChainError> for StorageError {
    fn from(err: litefab_chain::ChainError) -> Self {
        StorageError::Digest(err.to_string())
    }
}

/// Map size for each LMDB environment (1 GiB, sparse until used).
pub(crate) const LMDB_MAP_SIZE: usize = 1 << 30;
