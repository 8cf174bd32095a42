//! Transaction payloads, read/write sets, proposals and envelopes.
//!
//! The structs here are the wire entities; their canonical JSON form (sorted
//! keys, camelCase field names) is what gets signed. Each signing-byte
//! builder lists its covered fields explicitly so the signed subset is fixed
//! by construction rather than by struct layout.

use crate::policy::EndorsementPolicy;
use crate::types::Version;
use crate::ChainError;
use litefab_common::canonical_json_value;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    Deploy,
    Invoke,
}

/// What a transaction asks the chaincode host to do.
///
/// DEPLOY carries an endorsement policy; INVOKE carries a function name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxPayload {
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub chaincode_id: String,
    pub function_name: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub endorsement_policy: Option<EndorsementPolicy>,
}

impl TxPayload {
    pub fn deploy(chaincode_id: &str, args: Vec<String>, policy: EndorsementPolicy) -> Self {
        Self {
            tx_type: TxType::Deploy,
            chaincode_id: chaincode_id.to_string(),
            function_name: None,
            args,
            endorsement_policy: Some(policy),
        }
    }

    pub fn invoke(chaincode_id: &str, function: &str, args: Vec<String>) -> Self {
        Self {
            tx_type: TxType::Invoke,
            chaincode_id: chaincode_id.to_string(),
            function_name: Some(function.to_string()),
            args,
            endorsement_policy: None,
        }
    }
}

/// One recorded read: the key and the version observed at read time.
/// `version = None` means the key had never been written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEntry {
    pub key: String,
    pub version: Option<Version>,
}

/// One recorded write. `value = None` denotes a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteEntry {
    pub key: String,
    pub value: Option<String>,
}

/// Ordered reads and writes collected during simulation. Immutable once
/// returned by the endorser.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RwSet {
    pub reads: Vec<ReadEntry>,
    pub writes: Vec<WriteEntry>,
}

/// A client's signed request for simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub tx_id: String,
    pub creator_id: String,
    pub creator_org_id: String,
    pub creator_pub_key: String,
    pub payload: TxPayload,
    /// Base64 signature over [`Proposal::signing_bytes`].
    pub signature: String,
}

impl Proposal {
    /// Bytes covered by the client's proposal signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, ChainError> {
        let subset = json!({
            "txId": self.tx_id,
            "creatorId": self.creator_id,
            "creatorOrgId": self.creator_org_id,
            "creatorPubKey": self.creator_pub_key,
            "payload": serde_json::to_value(&self.payload).map_err(litefab_common::CanonicalError::from)?,
        });
        Ok(canonical_json_value(&subset).into_bytes())
    }
}

/// A peer's signed attestation over `(proposal, rwSet, result)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endorsement {
    pub endorser_id: String,
    pub endorser_org_id: String,
    pub signature: String,
}

/// Bytes every endorsement signature covers; the committer rebuilds the same
/// bytes from the envelope when it re-verifies.
pub fn endorsement_signing_bytes(
    tx_id: &str,
    payload: &TxPayload,
    rw_set: &RwSet,
    result: Option<&str>,
) -> Result<Vec<u8>, ChainError> {
    let subset = json!({
        "proposal": {
            "txId": tx_id,
            "payload": serde_json::to_value(payload).map_err(litefab_common::CanonicalError::from)?,
        },
        "rwSet": serde_json::to_value(rw_set).map_err(litefab_common::CanonicalError::from)?,
        "result": result,
    });
    Ok(canonical_json_value(&subset).into_bytes())
}

/// What the endorser returns to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalResponse {
    pub proposal: Proposal,
    pub rw_set: RwSet,
    pub result: Option<String>,
    pub endorsement: Endorsement,
}

/// The fully-assembled transaction the client submits for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEnvelope {
    pub tx_id: String,
    pub creator_id: String,
    pub creator_org_id: String,
    pub creator_pub_key: String,
    pub payload: TxPayload,
    pub rw_set: RwSet,
    pub result: Option<String>,
    pub endorsements: Vec<Endorsement>,
    /// Base64 signature over every other field, see [`Self::signing_bytes`].
    pub client_signature: String,
}

impl TransactionEnvelope {
    /// Bytes covered by the client envelope signature: every field except
    /// the signature itself.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, ChainError> {
        let subset = json!({
            "txId": self.tx_id,
            "creatorId": self.creator_id,
            "creatorOrgId": self.creator_org_id,
            "creatorPubKey": self.creator_pub_key,
            "payload": serde_json::to_value(&self.payload).map_err(litefab_common::CanonicalError::from)?,
            "rwSet": serde_json::to_value(&self.rw_set).map_err(litefab_common::CanonicalError::from)?,
            "result": self.result,
            "endorsements": serde_json::to_value(&self.endorsements).map_err(litefab_common::CanonicalError::from)?,
        });
        Ok(canonical_json_value(&subset).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyType;

    fn sample_envelope() -> TransactionEnvelope {
        TransactionEnvelope {
            tx_id: "tx-1".to_string(),
            creator_id: "Org1Client".to_string(),
            creator_org_id: "Org1".to_string(),
            creator_pub_key: "PEM".to_string(),
            payload: TxPayload::invoke("basic", "mint", vec!["500".into(), "Alice".into()]),
            rw_set: RwSet {
                reads: vec![ReadEntry {
                    key: "totalSupply".to_string(),
                    version: Some(Version::new(0, 0)),
                }],
                writes: vec![WriteEntry {
                    key: "totalSupply".to_string(),
                    value: Some("500".to_string()),
                }],
            },
            result: Some("500".to_string()),
            endorsements: vec![Endorsement {
                endorser_id: "Org1Peer".to_string(),
                endorser_org_id: "Org1".to_string(),
                signature: "sig".to_string(),
            }],
            client_signature: "client-sig".to_string(),
        }
    }

    #[test]
    fn envelope_signing_bytes_exclude_client_signature() {
        let env = sample_envelope();
        let mut other = env.clone();
        other.client_signature = "different".to_string();
        assert_eq!(env.signing_bytes().unwrap(), other.signing_bytes().unwrap());

        let mut changed = env.clone();
        changed.result = Some("501".to_string());
        assert_ne!(
            env.signing_bytes().unwrap(),
            changed.signing_bytes().unwrap()
        );
    }

    #[test]
    fn proposal_signing_bytes_are_canonical() {
        let payload = TxPayload::deploy(
            "basic",
            vec![],
            EndorsementPolicy::new(PolicyType::Any, vec!["Org1".to_string()]),
        );
        let proposal = Proposal {
            tx_id: "tx-9".to_string(),
            creator_id: "Org1Client".to_string(),
            creator_org_id: "Org1".to_string(),
            creator_pub_key: "PEM".to_string(),
            payload,
            signature: String::new(),
        };
        let bytes = proposal.signing_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        // keys sorted at the top level and inside the payload
        assert!(text.starts_with("{\"creatorId\""));
        assert!(text.contains("\"payload\":{\"args\":[]"));
        // signature itself is not covered
        assert!(!text.contains("signature"));
    }

    #[test]
    fn endorsement_bytes_cover_proposal_rwset_and_result() {
        let payload = TxPayload::invoke("basic", "mint", vec![]);
        let rw = RwSet::default();
        let with_result = endorsement_signing_bytes("tx-1", &payload, &rw, Some("ok")).unwrap();
        let without_result = endorsement_signing_bytes("tx-1", &payload, &rw, None).unwrap();
        assert_ne!(with_result, without_result);
        let text = String::from_utf8(with_result).unwrap();
        assert!(text.contains("\"proposal\":{\"payload\""));
    }
}
