//! Authenticated message encryption
//!
//! AES-256-GCM with a fresh random nonce per message. The ciphertext,
//! nonce and authentication tag travel separately in the published
//! ciphertext record; the key never leaves memory.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Nonce length for AES-256-GCM (96 bits)
pub const IV_LEN: usize = 12;

/// Authentication tag length (128 bits)
pub const TAG_LEN: usize = 16;

/// Key length (256 bits)
pub const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    /// The authentication tag did not verify. Fatal — never retried.
    #[error("authentication failed")]
    AuthFailed,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// An encrypted message with its nonce and detached authentication tag.
///
/// Matches the published ciphertext record field-for-field: the three
/// parts are hex-encoded independently at the relay layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
}

/// Encrypt a message under a 256-bit key.
///
/// Draws a fresh 96-bit nonce from the OS CSPRNG on every call.
/// Associated data is empty.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Result<SealedMessage, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut combined = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // aes-gcm appends the tag; detach it so the record can carry it separately
    let split = combined.len() - TAG_LEN;
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&combined[split..]);
    combined.truncate(split);

    Ok(SealedMessage {
        ciphertext: combined,
        iv,
        tag,
    })
}

/// Decrypt a sealed message.
///
/// Fails with [`CryptoError::AuthFailed`] if the tag does not verify;
/// no plaintext bytes are observable on failure. The returned buffer is
/// zeroized when dropped.
pub fn decrypt(
    sealed: &SealedMessage,
    key: &[u8; KEY_LEN],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut combined = Vec::with_capacity(sealed.ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(&sealed.ciphertext);
    combined.extend_from_slice(&sealed.tag);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&sealed.iv), combined.as_slice())
        .map_err(|_| CryptoError::AuthFailed)?;

    Ok(Zeroizing::new(plaintext))
}
