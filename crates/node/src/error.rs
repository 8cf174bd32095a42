//! Node-level error taxonomy.
//!
//! These variants mirror the network-facing error classes; the HTTP layer
//! maps each to its status code. Ledger-facing validation codes are not
//! errors; they are recorded per transaction and never abort a commit.

use litefab_chain::ChainError;
use litefab_runtime::ChaincodeError;
use litefab_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("chaincode execution failed: {0}")]
    ChaincodeExecution(String),

    #[error("consensus rejected submission: {0}")]
    Consensus(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ChaincodeError> for NodeError {
    fn from(err: ChaincodeError) -> Self {
        match err {
            ChaincodeError::UnknownChaincode(id) => {
                NodeError::NotFound(format!("chaincode {id:?} is not registered"))
            }
            ChaincodeError::Storage(e) => NodeError::Storage(e),
            other => NodeError::ChaincodeExecution(other.to_string()),
        }
    }
}
