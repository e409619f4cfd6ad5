//! Switch data model
//!
//! Validation happens at construction: a `Switch` that exists satisfies
//! the interval, recipient and guardian invariants. Status changes go
//! through the state machine only.

use nostr_sdk::{EventId, PublicKey};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::state::SwitchError;

/// Minimum check-in interval: one hour.
pub const MIN_INTERVAL_SECS: u64 = 3_600;
/// Maximum check-in interval: one year.
pub const MAX_INTERVAL_SECS: u64 = 31_536_000;
/// At most ten recipients per switch.
pub const MAX_RECIPIENTS: usize = 10;
/// Guardian set bounds: 3 ≤ threshold ≤ guardians ≤ 15.
pub const MIN_THRESHOLD: u8 = 3;
pub const MAX_GUARDIANS: usize = 15;
pub const DEFAULT_THRESHOLD: u8 = 3;
pub const DEFAULT_GUARDIANS: usize = 5;

/// Opaque 128-bit switch identifier, hex on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(#[serde(with = "hex::serde")] [u8; 16]);

impl SwitchId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_hex(input: &str) -> Result<Self, SwitchError> {
        let raw = hex::decode(input)
            .map_err(|_| SwitchError::InvalidInput("switch id is not hex".into()))?;
        let bytes: [u8; 16] = raw
            .try_into()
            .map_err(|_| SwitchError::InvalidInput("switch id must be 16 bytes".into()))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for SwitchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Where a recovered message goes.
///
/// The pubkey is the recipient's envelope key and relay address; the
/// email, when present, is only used by outer notification layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: Option<String>,
    pub pubkey: PublicKey,
}

/// One member of the escrow set.
///
/// A single key addresses the guardian on the relays and receives its
/// wrapped share. Guardians are individually untrusted: below the
/// threshold their shares are information-free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guardian {
    pub pubkey: PublicKey,
    /// Shamir x-coordinate, 1-based, unique per switch.
    pub index: u8,
}

/// Assign 1-based indices to a guardian key set.
pub fn guardians_from_pubkeys(pubkeys: &[PublicKey]) -> Vec<Guardian> {
    pubkeys
        .iter()
        .enumerate()
        .map(|(i, pk)| Guardian {
            pubkey: *pk,
            index: (i + 1) as u8,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchStatus {
    Armed,
    Paused,
    Triggered,
    Released,
    Cancelled,
}

impl SwitchStatus {
    /// Cancelled and Released admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, SwitchStatus::Cancelled | SwitchStatus::Released)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Switch {
    pub id: SwitchId,
    pub owner: PublicKey,
    pub title: String,
    pub created_at: u64,
    pub interval_secs: u64,
    /// Local view of the last check-in; the evaluator folds in the
    /// freshest relay observation before using it.
    pub last_checkin: u64,
    pub status: SwitchStatus,
    pub recipients: Vec<Recipient>,
    pub guardians: Vec<Guardian>,
    pub threshold: u8,
    /// Pointer to the published ciphertext record, set at seal time.
    pub ciphertext_event: Option<EventId>,
}

impl Switch {
    /// Build a new switch, enforcing every data-model invariant.
    pub fn new(
        owner: PublicKey,
        title: impl Into<String>,
        interval_secs: u64,
        recipients: Vec<Recipient>,
        guardians: Vec<Guardian>,
        threshold: u8,
        now: u64,
    ) -> Result<Self, SwitchError> {
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&interval_secs) {
            return Err(SwitchError::InvalidInput(format!(
                "interval {} outside [{}, {}]",
                interval_secs, MIN_INTERVAL_SECS, MAX_INTERVAL_SECS
            )));
        }
        if recipients.is_empty() || recipients.len() > MAX_RECIPIENTS {
            return Err(SwitchError::InvalidInput(format!(
                "recipient count {} outside [1, {}]",
                recipients.len(),
                MAX_RECIPIENTS
            )));
        }
        if guardians.len() > MAX_GUARDIANS {
            return Err(SwitchError::InvalidInput(format!(
                "guardian count {} above {}",
                guardians.len(),
                MAX_GUARDIANS
            )));
        }
        if threshold < MIN_THRESHOLD || (threshold as usize) > guardians.len() {
            return Err(SwitchError::InvalidInput(format!(
                "threshold {} outside [{}, {}]",
                threshold,
                MIN_THRESHOLD,
                guardians.len()
            )));
        }

        let mut seen = [false; 256];
        for guardian in &guardians {
            if guardian.index == 0 {
                return Err(SwitchError::InvalidInput("guardian index zero".into()));
            }
            if guardian.index as usize > guardians.len() {
                return Err(SwitchError::InvalidInput(format!(
                    "guardian index {} above set size {}",
                    guardian.index,
                    guardians.len()
                )));
            }
            if seen[guardian.index as usize] {
                return Err(SwitchError::InvalidInput(format!(
                    "duplicate guardian index {}",
                    guardian.index
                )));
            }
            seen[guardian.index as usize] = true;
        }

        Ok(Self {
            id: SwitchId::generate(),
            owner,
            title: title.into(),
            created_at: now,
            interval_secs,
            last_checkin: now,
            status: SwitchStatus::Armed,
            recipients,
            guardians,
            threshold,
            ciphertext_event: None,
        })
    }

    /// Unix time after which the switch is considered expired.
    pub fn deadline(&self) -> u64 {
        self.last_checkin + self.interval_secs
    }
}
