//! # Litefab Common Crate
//!
//! Shared substrate for the litefab node runtime.
//!
//! ## Modules
//! - `canonical`: deterministic JSON encoding + SHA-256 digests
//! - `crypto`: RSA-2048 signing/verification with base64-armored signatures
//! - `config`: TOML node/client configuration

pub mod canonical;
pub mod config;
pub mod crypto;

pub use canonical::{canonical_json, canonical_json_value, sha256_hex, CanonicalError};
pub use config::{ClientConfig, ConfigError, NodeConfig};
pub use crypto::CryptoError;
