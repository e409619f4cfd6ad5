//! Vigil Core
//!
//! Cryptographic building blocks shared by every Vigil role:
//!
//! - Authenticated message encryption (AES-256-GCM)
//! - Password key derivation (PBKDF2-HMAC-SHA256)
//! - Pairwise share envelopes (NIP-44 over secp256k1)
//! - Identity key handling and memory hardening
//!
//! Everything here is purely computational — no I/O, no async.

pub mod cipher;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod memory;

pub use cipher::{decrypt, encrypt, CryptoError, SealedMessage};
pub use envelope::{open, seal, EnvelopeError};
pub use kdf::{derive_key, generate_salt, PBKDF2_ITERATIONS, SALT_LEN};
