//! Committer: the peer-side validation pipeline.
//!
//! Transactions are processed strictly in block order. Each passes through
//! client-signature, endorsement-policy and MVCC checks; valid writes apply
//! immediately, so later transactions in the same block observe earlier
//! ones' writes. An invalid transaction is recorded with its validation
//! code and skipped; it never aborts the block.
//!
//! The committer holds the world-state write lock for the whole block and
//! runs as the single consumer of a block queue, which serializes commits
//! by block number.

use crate::error::NodeError;
use litefab_chain::{
    endorsement_signing_bytes, Block, ChaincodeMetadata, EndorsementPolicy, Msp, Role,
    TransactionEnvelope, TxType, ValidationCode, ValidationInfo,
};
use litefab_storage::{LedgerStore, WorldStateStore};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

pub struct Committer {
    msp: Arc<Msp>,
    ledger: Arc<LedgerStore>,
    world: Arc<RwLock<WorldStateStore>>,
}

impl Committer {
    pub fn new(
        msp: Arc<Msp>,
        ledger: Arc<LedgerStore>,
        world: Arc<RwLock<WorldStateStore>>,
    ) -> Self {
        Self { msp, ledger, world }
    }

    /// Validate every transaction in order, apply the valid ones, record
    /// validation codes into the block metadata and persist the block.
    pub fn commit_block(&self, mut block: Block) -> Result<Vec<ValidationInfo>, NodeError> {
        let bytes = block.orderer_signing_bytes()?;
        let outcome = self.msp.verify_signature(
            &bytes,
            &block.metadata.orderer_signature,
            &block.metadata.orderer_id,
            Some(Role::Orderer),
        );
        if !outcome.valid {
            return Err(NodeError::SignatureInvalid(
                outcome.error.unwrap_or_else(|| "orderer signature".to_string()),
            ));
        }

        let block_num = block.header.number;
        let world = self.world.write();
        let mut validation_info = Vec::with_capacity(block.transactions.len());
        for (tx_num, tx) in block.transactions.iter().enumerate() {
            let (code, message) = self.validate_and_apply(&world, tx, block_num, tx_num as u64)?;
            match code {
                ValidationCode::Valid => {
                    info!(block = block_num, tx = tx_num, tx_id = %tx.tx_id, "transaction committed")
                }
                other => {
                    warn!(
                        block = block_num,
                        tx = tx_num,
                        tx_id = %tx.tx_id,
                        code = ?other,
                        message = message.as_deref().unwrap_or(""),
                        "transaction invalidated"
                    )
                }
            }
            validation_info.push(ValidationInfo {
                tx_id: tx.tx_id.clone(),
                code,
                message,
            });
        }
        drop(world);

        block.metadata.validation_info = validation_info.clone();
        self.ledger.put_block(&block)?;
        for (tx_num, tx) in block.transactions.iter().enumerate() {
            self.ledger
                .put_tx_index(&tx.tx_id, block_num, tx_num as u64)?;
        }
        info!(
            block = block_num,
            txs = block.transactions.len(),
            valid = validation_info
                .iter()
                .filter(|v| v.code == ValidationCode::Valid)
                .count(),
            "block committed"
        );
        Ok(validation_info)
    }

    /// One transaction through the pipeline. Returns the validation verdict;
    /// errors only on store failures, which abort the whole commit.
    fn validate_and_apply(
        &self,
        world: &WorldStateStore,
        tx: &TransactionEnvelope,
        block_num: u64,
        tx_num: u64,
    ) -> Result<(ValidationCode, Option<String>), NodeError> {
        // 1. client signature over the full envelope
        let bytes = match tx.signing_bytes() {
            Ok(bytes) => bytes,
            Err(e) => return Ok((ValidationCode::BadPayload, Some(e.to_string()))),
        };
        let outcome =
            self.msp
                .verify_signature(&bytes, &tx.client_signature, &tx.creator_id, Some(Role::Client));
        if !outcome.valid {
            return Ok((ValidationCode::MspValidationFailed, outcome.error));
        }

        // 2. endorsement policy
        let policy = match tx.payload.tx_type {
            TxType::Deploy => tx
                .payload
                .endorsement_policy
                .clone()
                .unwrap_or_else(|| EndorsementPolicy::any_of_creator(&tx.creator_org_id)),
            TxType::Invoke => match world.get_chaincode_metadata(&tx.payload.chaincode_id)? {
                Some(meta) => meta.endorsement_policy,
                None => {
                    return Ok((
                        ValidationCode::BadPayload,
                        Some(format!(
                            "chaincode {:?} is not deployed",
                            tx.payload.chaincode_id
                        )),
                    ))
                }
            },
        };
        let endorse_bytes = match endorsement_signing_bytes(
            &tx.tx_id,
            &tx.payload,
            &tx.rw_set,
            tx.result.as_deref(),
        ) {
            Ok(bytes) => bytes,
            Err(e) => return Ok((ValidationCode::BadPayload, Some(e.to_string()))),
        };
        let mut endorsed_orgs = HashSet::new();
        for endorsement in &tx.endorsements {
            let outcome = self.msp.verify_signature(
                &endorse_bytes,
                &endorsement.signature,
                &endorsement.endorser_id,
                Some(Role::Peer),
            );
            if outcome.valid {
                if let Some(identity) = outcome.identity {
                    endorsed_orgs.insert(identity.org_id);
                }
            }
        }
        if !policy.is_satisfied_by(&endorsed_orgs) {
            return Ok((
                ValidationCode::EndorsementPolicyFailure,
                Some(format!(
                    "policy {}:{} not satisfied by {:?}",
                    policy.policy_type,
                    policy.orgs.join(","),
                    endorsed_orgs
                )),
            ));
        }

        // 3. MVCC against current state (earlier valid txs already applied)
        if !world.validate_read_set(&tx.rw_set.reads)? {
            return Ok((
                ValidationCode::MvccReadConflict,
                Some("read-set version mismatch".to_string()),
            ));
        }

        // 4. apply
        world.apply(&tx.rw_set, block_num, tx_num)?;
        if tx.payload.tx_type == TxType::Deploy {
            world.put_chaincode_metadata(
                &ChaincodeMetadata {
                    chaincode_id: tx.payload.chaincode_id.clone(),
                    version: "1.0".to_string(),
                    endorsement_policy: policy,
                },
                block_num,
                tx_num,
            )?;
        }
        Ok((ValidationCode::Valid, None))
    }
}

/// Channel feeding the single commit consumer.
pub type CommitSender = mpsc::Sender<(
    Block,
    oneshot::Sender<Result<Vec<ValidationInfo>, NodeError>>,
)>;

/// Spawn the commit worker: one consumer, blocks processed in arrival order.
pub fn spawn_commit_worker(committer: Arc<Committer>) -> CommitSender {
    let (sender, mut receiver) = mpsc::channel::<(
        Block,
        oneshot::Sender<Result<Vec<ValidationInfo>, NodeError>>,
    )>(64);
    tokio::spawn(async move {
        while let Some((block, reply)) = receiver.recv().await {
            let committer = committer.clone();
            let result = tokio::task::spawn_blocking(move || committer.commit_block(block))
                .await
                .unwrap_or_else(|e| Err(NodeError::Internal(format!("commit task failed: {e}"))));
            let _ = reply.send(result);
        }
    });
    sender
}
