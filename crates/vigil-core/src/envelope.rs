//! Pairwise share envelopes
//!
//! Wraps a single Shamir share from one participant to another using
//! NIP-44 v2: secp256k1 ECDH to a conversation key (HKDF-SHA256), then
//! authenticated encryption of the payload. Both sides are identified by
//! their long-term relay keys, so no extra key distribution is needed.
//!
//! Replaying a sealed blob is harmless — uniqueness is provided by the
//! enclosing relay event's id, not by the envelope.

use nostr_sdk::nips::nip44::{self, Version};
use nostr_sdk::{Keys, PublicKey};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("envelope seal failed: {0}")]
    SealFailed(String),
    /// Tamper, wrong recipient, or wrong claimed sender. Fatal.
    #[error("envelope authentication failed")]
    AuthFailed,
}

/// Seal a payload from `sender` to `recipient`.
///
/// The payload is text (shares travel hex-encoded); the returned blob is
/// the NIP-44 base64 payload, safe to embed in event content.
pub fn seal(
    plaintext: &str,
    sender: &Keys,
    recipient: &PublicKey,
) -> Result<String, EnvelopeError> {
    nip44::encrypt(sender.secret_key(), recipient, plaintext, Version::V2)
        .map_err(|e| EnvelopeError::SealFailed(e.to_string()))
}

/// Open a blob sealed to `recipient` by `sender`.
///
/// Any tamper — or a blob addressed to someone else — fails with
/// [`EnvelopeError::AuthFailed`]. Callers treat this as fatal for the
/// blob in hand and simply discard it.
pub fn open(
    blob: &str,
    sender: &PublicKey,
    recipient: &Keys,
) -> Result<String, EnvelopeError> {
    nip44::decrypt(recipient.secret_key(), sender, blob).map_err(|_| EnvelopeError::AuthFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let sender = Keys::generate();
        let recipient = Keys::generate();

        let blob = seal("0102030405", &sender, &recipient.public_key()).unwrap();
        let opened = open(&blob, &sender.public_key(), &recipient).unwrap();
        assert_eq!(opened, "0102030405");
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let sender = Keys::generate();
        let recipient = Keys::generate();
        let eavesdropper = Keys::generate();

        let blob = seal("share bytes", &sender, &recipient.public_key()).unwrap();
        let result = open(&blob, &sender.public_key(), &eavesdropper);
        assert!(matches!(result, Err(EnvelopeError::AuthFailed)));
    }

    #[test]
    fn test_wrong_sender_fails() {
        let sender = Keys::generate();
        let recipient = Keys::generate();
        let impostor = Keys::generate();

        let blob = seal("share bytes", &sender, &recipient.public_key()).unwrap();
        let result = open(&blob, &impostor.public_key(), &recipient);
        assert!(matches!(result, Err(EnvelopeError::AuthFailed)));
    }

    #[test]
    fn test_tampered_blob_fails() {
        let sender = Keys::generate();
        let recipient = Keys::generate();

        let blob = seal("share bytes", &sender, &recipient.public_key()).unwrap();

        // Flip one character somewhere in the middle of the base64 payload
        let mut chars: Vec<char> = blob.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        let result = open(&tampered, &sender.public_key(), &recipient);
        assert!(matches!(result, Err(EnvelopeError::AuthFailed)));
    }

    #[test]
    fn test_blob_differs_per_seal() {
        // Per-message salt: sealing the same payload twice yields distinct blobs
        let sender = Keys::generate();
        let recipient = Keys::generate();

        let a = seal("same payload", &sender, &recipient.public_key()).unwrap();
        let b = seal("same payload", &sender, &recipient.public_key()).unwrap();
        assert_ne!(a, b);
    }
}
