//! Block structure and the digests over it.
//!
//! Three distinct byte strings matter here and must not be conflated:
//! - `data_hash`: digest over the canonical transactions, set at cut time;
//! - the orderer signing bytes: header + transactions + the
//!   `{timestamp, ordererId}` metadata subset; `validation_info` and the
//!   signature itself are excluded, which is what lets the committer fill
//!   `validation_info` later without breaking the orderer's signature;
//! - the stored hash: digest over header, transactions and the full
//!   metadata as persisted, used for the ledger's hash index and for
//!   chaining `previous_hash`.

use crate::tx::TransactionEnvelope;
use crate::types::ValidationCode;
use crate::ChainError;
use chrono::Utc;
use litefab_common::{canonical_json, canonical_json_value, sha256_hex};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Previous-hash sentinel carried by block 0.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub number: u64,
    pub previous_hash: String,
    pub data_hash: String,
}

/// Per-transaction verdict recorded by the committer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationInfo {
    pub tx_id: String,
    pub code: ValidationCode,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMetadata {
    /// ISO-8601 timestamp assigned at cut time.
    pub timestamp: String,
    pub orderer_id: String,
    /// Base64 signature over [`Block::orderer_signing_bytes`]; empty until
    /// the orderer signs.
    pub orderer_signature: String,
    /// Filled by the committer; the only field mutated after signing.
    #[serde(default)]
    pub validation_info: Vec<ValidationInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<TransactionEnvelope>,
    pub metadata: BlockMetadata,
}

impl Block {
    /// Assemble an unsigned block at cut time.
    pub fn cut(
        number: u64,
        previous_hash: String,
        transactions: Vec<TransactionEnvelope>,
        orderer_id: &str,
    ) -> Result<Self, ChainError> {
        let data_hash = Self::compute_data_hash(&transactions)?;
        Ok(Self {
            header: BlockHeader {
                number,
                previous_hash,
                data_hash,
            },
            transactions,
            metadata: BlockMetadata {
                timestamp: Utc::now().to_rfc3339(),
                orderer_id: orderer_id.to_string(),
                orderer_signature: String::new(),
                validation_info: Vec::new(),
            },
        })
    }

    /// Digest over the concatenated canonical transactions.
    pub fn compute_data_hash(transactions: &[TransactionEnvelope]) -> Result<String, ChainError> {
        let mut buf = String::new();
        for tx in transactions {
            buf.push_str(&canonical_json(tx)?);
        }
        Ok(sha256_hex(buf.as_bytes()))
    }

    /// Bytes covered by the orderer signature. The metadata subset carries
    /// only `{timestamp, ordererId}`, so later `validation_info` writes
    /// cannot invalidate the signature.
    pub fn orderer_signing_bytes(&self) -> Result<Vec<u8>, ChainError> {
        let subset = json!({
            "header": serde_json::to_value(&self.header).map_err(litefab_common::CanonicalError::from)?,
            "transactions": serde_json::to_value(&self.transactions).map_err(litefab_common::CanonicalError::from)?,
            "metadata": {
                "timestamp": self.metadata.timestamp,
                "ordererId": self.metadata.orderer_id,
            },
        });
        Ok(canonical_json_value(&subset).into_bytes())
    }

    /// Hash of the block exactly as persisted: header, canonical
    /// transactions, full metadata. This is the value `previous_hash`
    /// chains on and the ledger's `hash:` index key.
    pub fn stored_hash(&self) -> Result<String, ChainError> {
        let mut buf = canonical_json(&self.header)?;
        for tx in &self.transactions {
            buf.push_str(&canonical_json(tx)?);
        }
        buf.push_str(&canonical_json(&self.metadata)?);
        Ok(sha256_hex(buf.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::TxPayload;

    fn tx(id: &str) -> TransactionEnvelope {
        TransactionEnvelope {
            tx_id: id.to_string(),
            creator_id: "Org1Client".to_string(),
            creator_org_id: "Org1".to_string(),
            creator_pub_key: "PEM".to_string(),
            payload: TxPayload::invoke("basic", "mint", vec!["1".into(), "A".into()]),
            rw_set: Default::default(),
            result: None,
            endorsements: vec![],
            client_signature: "sig".to_string(),
        }
    }

    #[test]
    fn data_hash_depends_on_tx_order() {
        let a = Block::compute_data_hash(&[tx("tx-1"), tx("tx-2")]).unwrap();
        let b = Block::compute_data_hash(&[tx("tx-2"), tx("tx-1")]).unwrap();
        assert_ne!(a, b);
        assert_eq!(
            a,
            Block::compute_data_hash(&[tx("tx-1"), tx("tx-2")]).unwrap()
        );
    }

    #[test]
    fn orderer_signing_bytes_ignore_validation_info_and_signature() {
        let mut block = Block::cut(0, GENESIS_PREVIOUS_HASH.to_string(), vec![tx("tx-1")], "Orderer1")
            .unwrap();
        let before = block.orderer_signing_bytes().unwrap();

        block.metadata.orderer_signature = "filled".to_string();
        block.metadata.validation_info.push(ValidationInfo {
            tx_id: "tx-1".to_string(),
            code: ValidationCode::Valid,
            message: None,
        });
        let after = block.orderer_signing_bytes().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn stored_hash_covers_full_metadata() {
        let mut block = Block::cut(0, GENESIS_PREVIOUS_HASH.to_string(), vec![tx("tx-1")], "Orderer1")
            .unwrap();
        let before = block.stored_hash().unwrap();
        block.metadata.validation_info.push(ValidationInfo {
            tx_id: "tx-1".to_string(),
            code: ValidationCode::MvccReadConflict,
            message: Some("conflict".to_string()),
        });
        assert_ne!(before, block.stored_hash().unwrap());
    }
}
