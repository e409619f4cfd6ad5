//! Recovery
//!
//! The recipient-side, server-less path: pull release events off the
//! relays, unwrap whatever decrypts, reconstruct the key from the first
//! threshold of distinct valid shares, fetch the ciphertext record, and
//! decrypt. Nothing beyond the recipient's keypair and the relay set is
//! needed.

use nostr_sdk::{Keys, PublicKey};
use zeroize::{Zeroize, Zeroizing};

use vigil_core::cipher::{self, CryptoError, SealedMessage};
use vigil_core::envelope;
use vigil_core::kdf;
use vigil_relay::events::{
    parse_ciphertext, parse_share_release, EventFilter, KIND_CIPHERTEXT, KIND_SHARE_RELEASE,
};
use vigil_relay::{RelayError, RelayTransport};
use vigil_shamir::{combine, decode_share, Share};
use vigil_switch::SwitchId;

#[derive(thiserror::Error, Debug)]
pub enum RecoverError {
    /// Fewer than `need` shares decrypted. Retryable — more guardians
    /// may release later.
    #[error("not enough shares released: have {got}, need {need}")]
    NotEnoughShares { got: usize, need: usize },

    /// No ciphertext record found for the switch.
    #[error("ciphertext record missing")]
    CiphertextMissing,

    /// The reconstructed key did not authenticate the ciphertext.
    /// Fatal — surfaced unchanged, never retried.
    #[error("authentication failed")]
    AuthFailed,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// A recovered plaintext and how it was obtained.
pub struct RecoveredMessage {
    /// Zeroized on drop; callers copy out what they need.
    pub plaintext: Zeroizing<Vec<u8>>,
    /// Distinct shares that went into the key (0 on the password path).
    pub shares_used: usize,
}

/// Recover the message for `switch_id` as a recipient.
pub async fn recover(
    switch_id: &SwitchId,
    owner: &PublicKey,
    recipient: &Keys,
    relay: &impl RelayTransport,
) -> Result<RecoveredMessage, RecoverError> {
    let id = switch_id.to_string();
    let recipient_hex = recipient.public_key().to_hex();

    // 1. Release events addressed to us (transport dedupes by event id)
    let filter = EventFilter::new()
        .kind(KIND_SHARE_RELEASE)
        .pubkey(recipient.public_key());
    let events = relay.query(filter).await?;

    // 2–3. Unwrap whatever is ours and valid; first k distinct indices win
    let mut shares: Vec<Share> = Vec::new();
    let mut threshold: Option<u8> = None;

    for event in &events {
        let for_this_switch = event
            .tags
            .identifier()
            .map(|d| d == id || d.starts_with(&format!("{}:", id)))
            .unwrap_or(false);
        if !for_this_switch {
            continue;
        }

        let Some(content) = parse_share_release(event) else {
            continue;
        };
        let Some(blob) = content.encrypted_shares.get(&recipient_hex) else {
            continue;
        };

        // The guardian that released is the event author
        let Ok(encoded) = envelope::open(blob, &event.pubkey, recipient) else {
            log::debug!("release event {} did not decrypt; skipping", event.id);
            continue;
        };
        let encoded = Zeroizing::new(encoded);

        let share = match decode_share(&encoded) {
            Ok(share) => share,
            Err(e) => {
                log::debug!("release event {} carried a bad share: {}", event.id, e);
                continue;
            }
        };
        if share.index != content.share_index {
            continue;
        }
        if shares.iter().any(|s| s.index == share.index) {
            continue;
        }

        threshold.get_or_insert(content.threshold);
        shares.push(share);

        if let Some(k) = threshold {
            if shares.len() >= k as usize {
                break;
            }
        }
    }

    let need = threshold.unwrap_or(0) as usize;
    if shares.is_empty() || shares.len() < need {
        let got = shares.len();
        shares.iter_mut().for_each(Zeroize::zeroize);
        return Err(RecoverError::NotEnoughShares {
            got,
            need: need.max(1),
        });
    }

    // 4. Reconstruct the key
    let key = combine(&shares, need as u8).map_err(|e| {
        RecoverError::InvalidInput(format!("share combination failed: {}", e))
    })?;
    let shares_used = shares.len();
    shares.iter_mut().for_each(Zeroize::zeroize);

    // 5–6. Fetch the ciphertext record and decrypt under the key
    let sealed = fetch_ciphertext(&id, owner, relay).await?.0;
    let plaintext = cipher::decrypt(&sealed, &key).map_err(|e| match e {
        CryptoError::AuthFailed => RecoverError::AuthFailed,
        other => RecoverError::InvalidInput(other.to_string()),
    })?;

    Ok(RecoveredMessage {
        plaintext,
        shares_used,
    })
}

/// Owner-side recovery: re-derive the key from the passphrase and the
/// published KDF parameters, no shares involved.
pub async fn recover_with_password(
    switch_id: &SwitchId,
    owner: &PublicKey,
    password: &str,
    relay: &impl RelayTransport,
) -> Result<RecoveredMessage, RecoverError> {
    let id = switch_id.to_string();
    let (sealed, salt, iterations) = fetch_ciphertext(&id, owner, relay).await?;

    let locked_password = vigil_core::memory::LockedBuffer::from_slice(password.as_bytes());
    let password = std::str::from_utf8(locked_password.as_slice())
        .map_err(|_| RecoverError::InvalidInput("password is not UTF-8".into()))?;
    let key = kdf::derive_key(password, &salt, iterations)
        .map_err(|e| RecoverError::InvalidInput(e.to_string()))?;

    let plaintext = cipher::decrypt(&sealed, &key).map_err(|e| match e {
        CryptoError::AuthFailed => RecoverError::AuthFailed,
        other => RecoverError::InvalidInput(other.to_string()),
    })?;

    Ok(RecoveredMessage {
        plaintext,
        shares_used: 0,
    })
}

/// Fetch and validate the ciphertext record for a switch.
async fn fetch_ciphertext(
    switch_id: &str,
    owner: &PublicKey,
    relay: &impl RelayTransport,
) -> Result<(SealedMessage, [u8; kdf::SALT_LEN], u32), RecoverError> {
    let filter = EventFilter::new()
        .kind(KIND_CIPHERTEXT)
        .author(*owner)
        .identifier(switch_id)
        .limit(1);
    let events = relay.query(filter).await?;

    let content = events
        .iter()
        .find_map(parse_ciphertext)
        .ok_or(RecoverError::CiphertextMissing)?;

    // Field shapes were validated at parse time; decode cannot fail on length
    let ciphertext = hex::decode(&content.ciphertext)
        .map_err(|_| RecoverError::CiphertextMissing)?;
    let iv: [u8; cipher::IV_LEN] = hex::decode(&content.iv)
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or(RecoverError::CiphertextMissing)?;
    let tag: [u8; cipher::TAG_LEN] = hex::decode(&content.auth_tag)
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or(RecoverError::CiphertextMissing)?;
    let salt: [u8; kdf::SALT_LEN] = hex::decode(&content.salt)
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or(RecoverError::CiphertextMissing)?;

    Ok((
        SealedMessage {
            ciphertext,
            iv,
            tag,
        },
        salt,
        content.iterations,
    ))
}
