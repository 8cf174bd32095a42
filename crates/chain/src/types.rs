//! Small shared protocol types.

use crate::policy::EndorsementPolicy;
use serde::{Deserialize, Serialize};

/// Version stamp a committed write leaves on a world-state key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub block_num: u64,
    pub tx_num: u64,
}

impl Version {
    pub fn new(block_num: u64, tx_num: u64) -> Self {
        Self { block_num, tx_num }
    }
}

/// Roles an identity may hold in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Client,
    Peer,
    Orderer,
}

/// Per-transaction verdict assigned by the committer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    Valid,
    EndorsementPolicyFailure,
    MvccReadConflict,
    BadPayload,
    MspValidationFailed,
}

/// World-state record describing a deployed chaincode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaincodeMetadata {
    pub chaincode_id: String,
    pub version: String,
    pub endorsement_policy: EndorsementPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_upper_case() {
        assert_eq!(serde_json::to_string(&Role::Orderer).unwrap(), "\"ORDERER\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"CLIENT\"").unwrap(),
            Role::Client
        );
    }

    #[test]
    fn validation_codes_match_wire_names() {
        assert_eq!(
            serde_json::to_string(&ValidationCode::MvccReadConflict).unwrap(),
            "\"MVCC_READ_CONFLICT\""
        );
        assert_eq!(
            serde_json::to_string(&ValidationCode::MspValidationFailed).unwrap(),
            "\"MSP_VALIDATION_FAILED\""
        );
    }
}
