//! # Litefab Runtime Crate
//!
//! The chaincode host: a registry of compiled-in application modules and the
//! per-transaction execution context that records every read and write.
//!
//! Chaincode must be deterministic: no clocks, no randomness, no iteration
//! over unordered containers. Given the same world-state snapshot and the
//! same payload, every honest endorser produces the same read/write set and
//! result.

pub mod context;
pub mod token;

pub use context::ExecutionContext;
pub use token::TokenChaincode;

use litefab_chain::{RwSet, TxPayload, TxType};
use litefab_storage::{StorageError, WorldStateStore};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChaincodeError {
    /// The application logic rejected the transaction. Surfaces to clients
    /// as a chaincode-execution failure and to the committer as BAD_PAYLOAD.
    #[error("chaincode execution failed: {0}")]
    Execution(String),

    #[error("unknown chaincode {0:?}")]
    UnknownChaincode(String),

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    #[error("bad arguments: {0}")]
    BadArgs(String),

    #[error("INVOKE payload is missing a function name")]
    MissingFunction,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Application logic invoked by transactions. Implementations interact with
/// state only through the [`ExecutionContext`].
pub trait Chaincode: Send + Sync {
    fn init(
        &self,
        ctx: &mut ExecutionContext<'_>,
        args: &[String],
    ) -> Result<Option<String>, ChaincodeError>;

    fn invoke(
        &self,
        ctx: &mut ExecutionContext<'_>,
        function: &str,
        args: &[String],
    ) -> Result<Option<String>, ChaincodeError>;
}

/// Registry of compiled-in chaincode modules, addressed by chaincode id.
#[derive(Default, Clone)]
pub struct ChaincodeRegistry {
    modules: HashMap<String, Arc<dyn Chaincode>>,
}

impl ChaincodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the modules this build ships.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("basic", Arc::new(TokenChaincode));
        registry
    }

    pub fn register(&mut self, chaincode_id: &str, module: Arc<dyn Chaincode>) {
        self.modules.insert(chaincode_id.to_string(), module);
    }

    pub fn get(&self, chaincode_id: &str) -> Option<Arc<dyn Chaincode>> {
        self.modules.get(chaincode_id).cloned()
    }

    /// Simulate a transaction against the current world state in a fresh
    /// context. On success the recorded read/write set and the chaincode
    /// result are returned; on any chaincode failure nothing escapes, the
    /// partial context is dropped.
    pub fn execute_transaction(
        &self,
        store: &WorldStateStore,
        payload: &TxPayload,
        creator_id: &str,
        creator_org_id: &str,
    ) -> Result<(RwSet, Option<String>), ChaincodeError> {
        let module = self
            .get(&payload.chaincode_id)
            .ok_or_else(|| ChaincodeError::UnknownChaincode(payload.chaincode_id.clone()))?;
        let mut ctx = ExecutionContext::new(store, creator_id, creator_org_id);
        let result = match payload.tx_type {
            TxType::Deploy => module.init(&mut ctx, &payload.args)?,
            TxType::Invoke => {
                let function = payload
                    .function_name
                    .as_deref()
                    .filter(|f| !f.is_empty())
                    .ok_or(ChaincodeError::MissingFunction)?;
                module.invoke(&mut ctx, function, &payload.args)?
            }
        };
        Ok((ctx.into_rw_set(), result))
    }
}
