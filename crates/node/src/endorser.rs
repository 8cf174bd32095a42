//! Endorser: simulates proposals and signs the outcome.
//!
//! The endorser only ever reads world state. The simulation runs under a
//! read guard so a concurrently committing block cannot interleave with it.

use crate::error::NodeError;
use litefab_chain::{
    endorsement_signing_bytes, Endorsement, Msp, Proposal, ProposalResponse, Role, TxType,
};
use litefab_common::crypto;
use litefab_runtime::ChaincodeRegistry;
use litefab_storage::WorldStateStore;
use parking_lot::RwLock;
use rsa::RsaPrivateKey;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Endorser {
    msp: Arc<Msp>,
    registry: ChaincodeRegistry,
    world: Arc<RwLock<WorldStateStore>>,
    signing_key: RsaPrivateKey,
    node_id: String,
    org_id: String,
}

impl Endorser {
    pub fn new(
        msp: Arc<Msp>,
        registry: ChaincodeRegistry,
        world: Arc<RwLock<WorldStateStore>>,
        signing_key: RsaPrivateKey,
        node_id: &str,
        org_id: &str,
    ) -> Self {
        Self {
            msp,
            registry,
            world,
            signing_key,
            node_id: node_id.to_string(),
            org_id: org_id.to_string(),
        }
    }

    /// Verify, simulate and endorse a proposal.
    pub fn handle_proposal(&self, proposal: &Proposal) -> Result<ProposalResponse, NodeError> {
        let bytes = proposal.signing_bytes()?;
        let outcome = self.msp.verify_signature(
            &bytes,
            &proposal.signature,
            &proposal.creator_id,
            Some(Role::Client),
        );
        if !outcome.valid {
            return Err(NodeError::SignatureInvalid(
                outcome.error.unwrap_or_else(|| "proposal signature".to_string()),
            ));
        }

        let world = self.world.read();
        if proposal.payload.tx_type == TxType::Invoke
            && world
                .get_chaincode_metadata(&proposal.payload.chaincode_id)?
                .is_none()
        {
            return Err(NodeError::NotFound(format!(
                "chaincode {:?} is not deployed",
                proposal.payload.chaincode_id
            )));
        }

        let (rw_set, result) = self.registry.execute_transaction(
            &world,
            &proposal.payload,
            &proposal.creator_id,
            &proposal.creator_org_id,
        )?;
        drop(world);
        debug!(
            tx_id = %proposal.tx_id,
            reads = rw_set.reads.len(),
            writes = rw_set.writes.len(),
            "simulation complete"
        );

        let endorse_bytes = endorsement_signing_bytes(
            &proposal.tx_id,
            &proposal.payload,
            &rw_set,
            result.as_deref(),
        )?;
        let signature = crypto::sign(&self.signing_key, &endorse_bytes);
        info!(tx_id = %proposal.tx_id, creator = %proposal.creator_id, "proposal endorsed");

        Ok(ProposalResponse {
            proposal: proposal.clone(),
            rw_set,
            result,
            endorsement: Endorsement {
                endorser_id: self.node_id.clone(),
                endorser_org_id: self.org_id.clone(),
                signature,
            },
        })
    }
}
