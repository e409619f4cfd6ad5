//! Participant identity keys
//!
//! Every participant — owner, guardian, recipient — is one secp256k1
//! keypair. The same key addresses the participant on the relay network
//! and anchors the NIP-44 envelope exchange, so there is nothing extra
//! to distribute.

use nostr_sdk::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
}

/// Generate a fresh identity.
pub fn generate() -> Keys {
    Keys::generate()
}

/// Parse a secret key from nsec or hex form.
pub fn parse_keys(input: &str) -> Result<Keys, KeyError> {
    Keys::parse(input).map_err(|e| KeyError::InvalidSecretKey(e.to_string()))
}

/// Parse a public key from npub or hex form.
pub fn parse_public_key(input: &str) -> Result<PublicKey, KeyError> {
    if input.starts_with("npub") {
        return PublicKey::from_bech32(input)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()));
    }
    PublicKey::from_hex(input).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
}
