//! Orderer core: turns a batch of envelopes into a signed, persisted,
//! broadcast block.
//!
//! The next block number and previous hash always come from the ledger tip,
//! so the hash chain is real from block 0 onward. Cuts are serialized by an
//! async mutex; consensus modules may call in from timers and submissions
//! concurrently.

use crate::broadcaster::Broadcaster;
use crate::error::NodeError;
use litefab_chain::block::GENESIS_PREVIOUS_HASH;
use litefab_chain::{Block, TransactionEnvelope};
use litefab_common::crypto;
use litefab_storage::LedgerStore;
use rsa::RsaPrivateKey;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub struct OrdererService {
    ledger: Arc<LedgerStore>,
    signing_key: RsaPrivateKey,
    orderer_id: String,
    broadcaster: Broadcaster,
    cut_lock: Mutex<()>,
}

impl OrdererService {
    pub fn new(
        ledger: Arc<LedgerStore>,
        signing_key: RsaPrivateKey,
        orderer_id: &str,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            ledger,
            signing_key,
            orderer_id: orderer_id.to_string(),
            broadcaster,
            cut_lock: Mutex::new(()),
        }
    }

    pub fn orderer_id(&self) -> &str {
        &self.orderer_id
    }

    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    /// Cut a block from the batch: number and previous hash from the ledger
    /// tip, orderer signature over the signed subset, persist locally,
    /// broadcast to peers.
    pub async fn commit_cut(
        &self,
        transactions: Vec<TransactionEnvelope>,
    ) -> Result<Block, NodeError> {
        let _guard = self.cut_lock.lock().await;

        let latest = self.ledger.latest_block_number()?;
        let (number, previous_hash) = if latest < 0 {
            (0, GENESIS_PREVIOUS_HASH.to_string())
        } else {
            let tip = self.ledger.get_block(latest as u64)?.ok_or_else(|| {
                NodeError::Internal(format!("ledger latest points at missing block {latest}"))
            })?;
            ((latest + 1) as u64, tip.stored_hash()?)
        };

        let mut block = Block::cut(number, previous_hash, transactions, &self.orderer_id)?;
        let bytes = block.orderer_signing_bytes()?;
        block.metadata.orderer_signature = crypto::sign(&self.signing_key, &bytes);

        self.ledger.put_block(&block)?;
        info!(
            block = number,
            txs = block.transactions.len(),
            "block cut and persisted"
        );
        self.broadcaster.broadcast(&block).await;
        Ok(block)
    }

    /// Store a block received from another orderer (`/broadcast`).
    pub fn store_block(&self, block: &Block) -> Result<(), NodeError> {
        self.ledger.put_block(block)?;
        Ok(())
    }
}
