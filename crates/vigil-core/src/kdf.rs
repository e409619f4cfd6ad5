//! Password key derivation
//!
//! PBKDF2-HMAC-SHA256 with a per-switch random salt. The iteration count
//! is persisted alongside the ciphertext record so that old records keep
//! decrypting after a future work-factor bump; seal-time validation
//! rejects counts below the current floor.

use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

use crate::cipher::{CryptoError, KEY_LEN};

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Minimum (and current) PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 600_000;

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit encryption key from a password and salt.
///
/// The password is NFC-normalized before hashing, so visually identical
/// inputs typed on different platforms derive the same key. The returned
/// key is zeroized on drop.
pub fn derive_key(
    password: &str,
    salt: &[u8; SALT_LEN],
    iterations: u32,
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    if iterations < PBKDF2_ITERATIONS {
        return Err(CryptoError::InvalidInput(format!(
            "iteration count {} below minimum {}",
            iterations, PBKDF2_ITERATIONS
        )));
    }

    let normalized: Zeroizing<String> = Zeroizing::new(password.nfc().collect());

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(normalized.as_bytes(), salt, iterations, key.as_mut());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Full-strength derivation is slow by design; tests that only care
    // about determinism drive pbkdf2_hmac directly with a small count.
    fn derive_fast(password: &str, salt: &[u8; SALT_LEN]) -> [u8; KEY_LEN] {
        let normalized: String = password.nfc().collect();
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(normalized.as_bytes(), salt, 10, &mut key);
        key
    }

    #[test]
    fn test_deterministic_for_same_inputs() {
        let salt = [7u8; SALT_LEN];
        let a = derive_fast("correct horse battery staple", &salt);
        let b = derive_fast("correct horse battery staple", &salt);
        assert_eq!(a, b);
    }

    #[test]
    fn test_salt_changes_key() {
        let a = derive_fast("password", &[1u8; SALT_LEN]);
        let b = derive_fast("password", &[2u8; SALT_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_password_changes_key() {
        let salt = [3u8; SALT_LEN];
        let a = derive_fast("password one", &salt);
        let b = derive_fast("password two", &salt);
        assert_ne!(a, b);
    }

    #[test]
    fn test_nfc_normalization() {
        // U+00E9 (é) vs U+0065 U+0301 (e + combining acute) — same key after NFC
        let salt = [9u8; SALT_LEN];
        let composed = derive_fast("caf\u{00e9}", &salt);
        let decomposed = derive_fast("cafe\u{0301}", &salt);
        assert_eq!(composed, decomposed);
    }

    #[test]
    fn test_iteration_floor_enforced() {
        let salt = [0u8; SALT_LEN];
        let result = derive_key("pw", &salt, 10_000);
        assert!(matches!(result, Err(CryptoError::InvalidInput(_))));
    }

    #[test]
    fn test_generate_salt_is_random() {
        let a = generate_salt();
        let b = generate_salt();
        assert_ne!(a, b);
    }

    #[test]
    fn test_full_strength_derivation() {
        // One real 600k-iteration run to pin the work factor end to end
        let salt = [0xAB; SALT_LEN];
        let key = derive_key("test vector", &salt, PBKDF2_ITERATIONS).unwrap();
        let again = derive_key("test vector", &salt, PBKDF2_ITERATIONS).unwrap();
        assert_eq!(key.as_ref(), again.as_ref());
    }
}
