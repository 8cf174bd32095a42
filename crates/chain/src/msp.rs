//! Membership Service Provider: the read-only identity directory.
//!
//! Loaded once at startup from a JSON document; identities are immutable
//! for the life of the process. Signature verification reports failures as
//! values (`VerifyOutcome`) so callers can map them to protocol errors.

use crate::types::Role;
use litefab_common::crypto;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MspError {
    #[error("failed to read MSP document: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse MSP document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate identity id {0:?}")]
    DuplicateIdentity(String),

    #[error("identity {id:?} declares org {declared:?} but is listed under {parent:?}")]
    OrgMismatch {
        id: String,
        declared: String,
        parent: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub org_id: String,
    pub role: Role,
    /// SPKI PEM public key; stable for the identity lifetime.
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub org_id: String,
    #[serde(default)]
    pub root_public_keys: Vec<String>,
    pub identities: Vec<Identity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MspDocument {
    pub orgs: Vec<Organization>,
}

/// Outcome of a signature verification. Never a panic, never a thrown
/// error: bad signatures, unknown signers and role mismatches all land in
/// `valid = false` with a cause string.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub valid: bool,
    pub identity: Option<Identity>,
    pub error: Option<String>,
}

impl VerifyOutcome {
    fn ok(identity: Identity) -> Self {
        Self {
            valid: true,
            identity: Some(identity),
            error: None,
        }
    }

    fn fail(identity: Option<Identity>, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            identity,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Msp {
    orgs: HashMap<String, Organization>,
    identities: HashMap<String, Identity>,
}

impl Msp {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MspError> {
        let raw = fs::read_to_string(path)?;
        let doc: MspDocument = serde_json::from_str(&raw)?;
        Self::from_document(doc)
    }

    pub fn from_document(doc: MspDocument) -> Result<Self, MspError> {
        let mut orgs = HashMap::new();
        let mut identities: HashMap<String, Identity> = HashMap::new();
        for org in doc.orgs {
            for identity in &org.identities {
                if identity.org_id != org.org_id {
                    return Err(MspError::OrgMismatch {
                        id: identity.id.clone(),
                        declared: identity.org_id.clone(),
                        parent: org.org_id.clone(),
                    });
                }
                if identities
                    .insert(identity.id.clone(), identity.clone())
                    .is_some()
                {
                    return Err(MspError::DuplicateIdentity(identity.id.clone()));
                }
            }
            orgs.insert(org.org_id.clone(), org);
        }
        Ok(Self { orgs, identities })
    }

    pub fn get_identity(&self, id: &str) -> Option<&Identity> {
        self.identities.get(id)
    }

    pub fn get_organization(&self, org_id: &str) -> Option<&Organization> {
        self.orgs.get(org_id)
    }

    pub fn has_role(&self, id: &str, role: Role) -> bool {
        self.get_identity(id).map(|i| i.role == role).unwrap_or(false)
    }

    /// Verify `signature_b64` over `data` for the given signer, optionally
    /// enforcing the signer's role.
    pub fn verify_signature(
        &self,
        data: &[u8],
        signature_b64: &str,
        signer_id: &str,
        expected_role: Option<Role>,
    ) -> VerifyOutcome {
        let identity = match self.get_identity(signer_id) {
            Some(identity) => identity.clone(),
            None => return VerifyOutcome::fail(None, format!("unknown identity {signer_id:?}")),
        };
        if let Some(role) = expected_role {
            if identity.role != role {
                return VerifyOutcome::fail(
                    Some(identity.clone()),
                    format!("identity {signer_id:?} does not hold role {role:?}"),
                );
            }
        }
        if crypto::verify_with_pem(&identity.public_key, data, signature_b64) {
            VerifyOutcome::ok(identity)
        } else {
            VerifyOutcome::fail(Some(identity), "signature verification failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litefab_common::crypto::{generate_keypair, public_key_to_pem, sign};
    use rsa::RsaPublicKey;
    use std::sync::OnceLock;

    fn keypair() -> &'static rsa::RsaPrivateKey {
        static KEY: OnceLock<rsa::RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| generate_keypair().expect("generate keypair"))
    }

    fn msp_with_client() -> Msp {
        let pem = public_key_to_pem(&RsaPublicKey::from(keypair())).expect("pem");
        Msp::from_document(MspDocument {
            orgs: vec![Organization {
                org_id: "Org1".to_string(),
                root_public_keys: vec![pem.clone()],
                identities: vec![Identity {
                    id: "Org1Client".to_string(),
                    org_id: "Org1".to_string(),
                    role: Role::Client,
                    public_key: pem,
                }],
            }],
        })
        .expect("msp")
    }

    #[test]
    fn verifies_known_signer_with_role() {
        let msp = msp_with_client();
        let sig = sign(keypair(), b"payload");
        let outcome = msp.verify_signature(b"payload", &sig, "Org1Client", Some(Role::Client));
        assert!(outcome.valid, "{:?}", outcome.error);
        assert_eq!(outcome.identity.unwrap().org_id, "Org1");
    }

    #[test]
    fn role_mismatch_is_reported_not_thrown() {
        let msp = msp_with_client();
        let sig = sign(keypair(), b"payload");
        let outcome = msp.verify_signature(b"payload", &sig, "Org1Client", Some(Role::Peer));
        assert!(!outcome.valid);
        assert!(outcome.error.unwrap().contains("role"));
    }

    #[test]
    fn unknown_signer_and_bad_signature_fail() {
        let msp = msp_with_client();
        let outcome = msp.verify_signature(b"payload", "sig", "Nobody", None);
        assert!(!outcome.valid);
        assert!(outcome.identity.is_none());

        let sig = sign(keypair(), b"other payload");
        let outcome = msp.verify_signature(b"payload", &sig, "Org1Client", None);
        assert!(!outcome.valid);
    }

    #[test]
    fn org_mismatch_rejected_at_load() {
        let err = Msp::from_document(MspDocument {
            orgs: vec![Organization {
                org_id: "Org1".to_string(),
                root_public_keys: vec![],
                identities: vec![Identity {
                    id: "Stray".to_string(),
                    org_id: "Org2".to_string(),
                    role: Role::Client,
                    public_key: String::new(),
                }],
            }],
        })
        .unwrap_err();
        assert!(matches!(err, MspError::OrgMismatch { .. }));
    }
}
