//! Crypto helpers: RSA-2048 keypairs, SHA-256 signing, verification, and
//! PEM utilities.
//!
//! Signatures are PKCS#1 v1.5 over a SHA-256 digest and travel base64-armored.
//! Verification never panics and never errors on a merely-bad signature: a
//! signature that does not match yields `Ok(false)`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

pub const RSA_KEY_BITS: usize = 2048;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Generate a fresh RSA-2048 keypair.
pub fn generate_keypair() -> Result<RsaPrivateKey, CryptoError> {
    let mut rng = rand::rngs::OsRng;
    RsaPrivateKey::new(&mut rng, RSA_KEY_BITS).map_err(|e| CryptoError::KeyGeneration(e.to_string()))
}

/// Encode a private key as PKCS#8 PEM.
pub fn private_key_to_pem(key: &RsaPrivateKey) -> Result<String, CryptoError> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Decode a private key from PKCS#8 PEM.
pub fn private_key_from_pem(pem: &str) -> Result<RsaPrivateKey, CryptoError> {
    RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Encode a public key as SPKI PEM. This is the form identities carry in the MSP.
pub fn public_key_to_pem(key: &RsaPublicKey) -> Result<String, CryptoError> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Decode a public key from SPKI PEM.
pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_pem(pem).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Sign data and return the base64-armored signature.
pub fn sign(key: &RsaPrivateKey, data: &[u8]) -> String {
    let signing_key = SigningKey::<Sha256>::new(key.clone());
    let signature = signing_key.sign(data);
    BASE64.encode(signature.to_vec())
}

/// Verify a base64-armored signature against a public key.
///
/// Returns `Ok(false)` for a well-formed signature that does not match;
/// errors only on undecodable armor.
pub fn verify(key: &RsaPublicKey, data: &[u8], signature_b64: &str) -> Result<bool, CryptoError> {
    let raw = BASE64.decode(signature_b64)?;
    let signature = match Signature::try_from(raw.as_slice()) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };
    let verifying_key = VerifyingKey::<Sha256>::new(key.clone());
    Ok(verifying_key.verify(data, &signature).is_ok())
}

/// Verify against a PEM-encoded public key, treating unparseable keys as
/// a failed verification rather than an error.
pub fn verify_with_pem(pub_key_pem: &str, data: &[u8], signature_b64: &str) -> bool {
    match public_key_from_pem(pub_key_pem) {
        Ok(key) => verify(&key, data, signature_b64).unwrap_or(false),
        Err(_) => false,
    }
}
