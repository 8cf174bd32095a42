//! Shared test fixture: one RSA keypair per network identity (generated
//! once per test binary) and the MSP document that registers them.

#![allow(dead_code)]

use litefab_chain::{Identity, Msp, MspDocument, Organization, Role};
use litefab_common::crypto;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::sync::OnceLock;

pub struct TestKeys {
    pub client1: RsaPrivateKey,
    pub peer1: RsaPrivateKey,
    pub peer2: RsaPrivateKey,
    pub orderer: RsaPrivateKey,
}

pub fn keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| TestKeys {
        client1: crypto::generate_keypair().expect("client1 keypair"),
        peer1: crypto::generate_keypair().expect("peer1 keypair"),
        peer2: crypto::generate_keypair().expect("peer2 keypair"),
        orderer: crypto::generate_keypair().expect("orderer keypair"),
    })
}

pub fn public_pem(key: &RsaPrivateKey) -> String {
    crypto::public_key_to_pem(&RsaPublicKey::from(key)).expect("public pem")
}

fn identity(id: &str, org_id: &str, role: Role, key: &RsaPrivateKey) -> Identity {
    Identity {
        id: id.to_string(),
        org_id: org_id.to_string(),
        role,
        public_key: public_pem(key),
    }
}

/// Two peer orgs plus the orderer org, mirroring the sample network that
/// `generate-config` emits.
pub fn test_msp() -> Msp {
    let keys = keys();
    Msp::from_document(MspDocument {
        orgs: vec![
            Organization {
                org_id: "Org1".to_string(),
                root_public_keys: vec![public_pem(&keys.client1)],
                identities: vec![
                    identity("Org1Client", "Org1", Role::Client, &keys.client1),
                    identity("Org1Peer", "Org1", Role::Peer, &keys.peer1),
                ],
            },
            Organization {
                org_id: "Org2".to_string(),
                root_public_keys: vec![public_pem(&keys.peer2)],
                identities: vec![identity("Org2Peer", "Org2", Role::Peer, &keys.peer2)],
            },
            Organization {
                org_id: "OrdererOrg".to_string(),
                root_public_keys: vec![public_pem(&keys.orderer)],
                identities: vec![identity("Orderer1", "OrdererOrg", Role::Orderer, &keys.orderer)],
            },
        ],
    })
    .expect("test msp")
}
