//! Sealing
//!
//! Turns a plaintext message into relay records: derive the key from the
//! owner's passphrase, encrypt, split the key, wrap one share per
//! guardian, publish everything. The key and the shares exist only
//! inside this function and are zeroized before it returns — the relays
//! never see anything a threshold of guardians can't jointly undo.

use nostr_sdk::{EventId, Keys};
use zeroize::{Zeroize, Zeroizing};

use vigil_core::cipher::{self, CryptoError};
use vigil_core::envelope::{self, EnvelopeError};
use vigil_core::kdf::{self, PBKDF2_ITERATIONS, SALT_LEN};
use vigil_core::memory;
use vigil_relay::events::{
    build_cancel_event, build_checkin_event, build_ciphertext_event, build_share_initial_event,
    CiphertextContent, ShareInitialContent,
};
use vigil_relay::{RelayError, RelayTransport};
use vigil_shamir::{encode_share, split, ShamirError};
use vigil_switch::{Clock, Switch, SwitchError, SwitchId};

#[derive(thiserror::Error, Debug)]
pub enum SealError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Shamir(#[from] ShamirError),

    #[error(transparent)]
    State(#[from] SwitchError),

    /// A record could not be placed on a single relay. Retriable.
    #[error("record not replicated to any relay: {0}")]
    PublishUnderReplicated(String),

    #[error(transparent)]
    Relay(RelayError),
}

// Total relay failure while sealing means the record is on zero relays.
impl From<RelayError> for SealError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::AllRelaysFailed(msg) => SealError::PublishUnderReplicated(msg),
            other => SealError::Relay(other),
        }
    }
}

/// Everything the owner needs to keep (none of it secret) after sealing.
#[derive(Debug, Clone)]
pub struct SealReceipt {
    pub switch_id: SwitchId,
    pub ciphertext_event: EventId,
    pub share_events: Vec<EventId>,
    pub iv: [u8; cipher::IV_LEN],
    pub tag: [u8; cipher::TAG_LEN],
    pub salt: [u8; SALT_LEN],
    pub iterations: u32,
    pub time_sealed: u64,
}

/// Seal `message` under `password` and distribute it for `switch`.
///
/// Atomic from the caller's view: on success the ciphertext record and
/// one wrapped-share record per guardian are on at least one relay and
/// the switch is armed with its ciphertext pointer set. Fails with
/// [`SealError::PublishUnderReplicated`] if the ciphertext record lands
/// on no relay at all; share records missing from a minority of relays
/// are tolerated since every accepting relay holds the full event set.
pub async fn seal(
    switch: &mut Switch,
    message: &[u8],
    password: &str,
    owner: &Keys,
    relay: &impl RelayTransport,
    clock: &impl Clock,
) -> Result<SealReceipt, SealError> {
    if owner.public_key() != switch.owner {
        return Err(SealError::InvalidInput(
            "signing key does not match switch owner".into(),
        ));
    }
    if message.is_empty() {
        return Err(SealError::InvalidInput("message is empty".into()));
    }
    if password.is_empty() {
        return Err(SealError::InvalidInput("password is empty".into()));
    }

    let now = clock.now();
    let switch_id = switch.id.to_string();

    // 1. Key from passphrase; the working copy is mlocked and zeroed
    let locked_password = memory::LockedBuffer::from_slice(password.as_bytes());
    let password = std::str::from_utf8(locked_password.as_slice())
        .map_err(|_| SealError::InvalidInput("password is not UTF-8".into()))?;
    let salt = kdf::generate_salt();
    let key = kdf::derive_key(password, &salt, PBKDF2_ITERATIONS)?;

    // 2. Encrypt the message
    let sealed = cipher::encrypt(message, &key)?;

    // 3. Split the key across the guardian set
    let total = switch.guardians.len() as u8;
    let mut shares = split(&key, switch.threshold, total)?;

    // 4. Wrap each guardian's share under its transport key
    let mut wrapped = Vec::with_capacity(shares.len());
    for guardian in &switch.guardians {
        let share = shares
            .iter()
            .find(|s| s.index == guardian.index)
            .ok_or_else(|| {
                SealError::InvalidInput(format!("no share for guardian index {}", guardian.index))
            })?;
        let encoded = Zeroizing::new(encode_share(share));
        let blob = envelope::seal(&encoded, owner, &guardian.pubkey)?;
        wrapped.push((guardian.clone(), share.index, blob));
    }
    shares.iter_mut().for_each(Zeroize::zeroize);
    drop(key);

    // 5. Publish the ciphertext record, then the share records
    let ciphertext_content = CiphertextContent {
        ciphertext: hex::encode(&sealed.ciphertext),
        iv: hex::encode(sealed.iv),
        auth_tag: hex::encode(sealed.tag),
        salt: hex::encode(salt),
        iterations: PBKDF2_ITERATIONS,
    };
    let ciphertext_event = build_ciphertext_event(owner, &switch_id, &ciphertext_content, now)?;
    let ciphertext_outcome = relay.publish(ciphertext_event).await?;
    if !ciphertext_outcome.fully_replicated() {
        log::warn!(
            "ciphertext record for {} missing from {} relay(s)",
            switch_id,
            ciphertext_outcome.failed.len()
        );
    }

    let mut share_events = Vec::with_capacity(wrapped.len());
    for (guardian, index, blob) in wrapped {
        let content = ShareInitialContent {
            share_index: index,
            threshold: switch.threshold,
            wrapped_blob: blob,
        };
        let event =
            build_share_initial_event(owner, &switch_id, &guardian.pubkey, &content, now)?;
        let outcome = relay.publish(event).await?;
        share_events.push(outcome.event_id);
    }

    switch.ciphertext_event = Some(ciphertext_outcome.event_id);
    switch.last_checkin = now;

    log::info!(
        "sealed switch {} ({} guardians, threshold {})",
        switch_id,
        share_events.len(),
        switch.threshold
    );

    Ok(SealReceipt {
        switch_id: switch.id,
        ciphertext_event: ciphertext_outcome.event_id,
        share_events,
        iv: sealed.iv,
        tag: sealed.tag,
        salt,
        iterations: PBKDF2_ITERATIONS,
        time_sealed: now,
    })
}

/// Publish an owner check-in and reset the local deadline.
pub async fn check_in(
    switch: &mut Switch,
    owner: &Keys,
    relay: &impl RelayTransport,
    clock: &impl Clock,
) -> Result<EventId, SealError> {
    let now = clock.now();
    let event = build_checkin_event(owner, &switch.id.to_string(), now)?;
    let outcome = relay.publish(event).await?;
    switch.check_in(now)?;
    Ok(outcome.event_id)
}

/// Publish a cancellation marker and retire the switch.
pub async fn cancel(
    switch: &mut Switch,
    owner: &Keys,
    relay: &impl RelayTransport,
    clock: &impl Clock,
) -> Result<EventId, SealError> {
    let now = clock.now();
    let event = build_cancel_event(owner, &switch.id.to_string(), now)?;
    let outcome = relay.publish(event).await?;
    switch.cancel()?;
    Ok(outcome.event_id)
}
