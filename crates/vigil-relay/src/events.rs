//! Event kinds, content schemas, and filters
//!
//! Three record kinds carry the cryptographic material; two more carry
//! the owner's liveness signals. Event `content` is a JSON string: every
//! field is validated on parse, and an event that fails validation is
//! skipped as if it did not exist — partially parsed events never
//! propagate.

use std::collections::BTreeMap;

use nostr_sdk::prelude::*;
use serde::{Deserialize, Serialize};

use crate::RelayError;

/// Sealed message record: ciphertext, nonce, tag, KDF parameters.
pub const KIND_CIPHERTEXT: Kind = Kind::Custom(2460);
/// Wrapped share addressed to the guardian that holds it.
pub const KIND_SHARE_INITIAL: Kind = Kind::Custom(2461);
/// Released share re-wrapped to a recipient.
pub const KIND_SHARE_RELEASE: Kind = Kind::Custom(2462);
/// Owner heartbeat.
pub const KIND_CHECKIN: Kind = Kind::Custom(2463);
/// Owner cancellation marker.
pub const KIND_CANCEL: Kind = Kind::Custom(2464);

const IV_HEX_LEN: usize = 24; // 96-bit nonce
const TAG_HEX_LEN: usize = 32; // 128-bit tag
const SALT_HEX_LEN: usize = 32; // 16-byte salt

/// Content of a [`KIND_CIPHERTEXT`] event. All byte fields are hex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiphertextContent {
    pub ciphertext: String,
    pub iv: String,
    pub auth_tag: String,
    pub salt: String,
    pub iterations: u32,
}

impl CiphertextContent {
    fn is_valid(&self) -> bool {
        hex::decode(&self.ciphertext).is_ok()
            && self.iv.len() == IV_HEX_LEN
            && hex::decode(&self.iv).is_ok()
            && self.auth_tag.len() == TAG_HEX_LEN
            && hex::decode(&self.auth_tag).is_ok()
            && self.salt.len() == SALT_HEX_LEN
            && hex::decode(&self.salt).is_ok()
            && self.iterations > 0
    }
}

/// Content of a [`KIND_SHARE_INITIAL`] event.
///
/// `threshold` rides with every share record so recovery never depends
/// on out-of-band metadata for `k`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareInitialContent {
    pub share_index: u8,
    pub threshold: u8,
    pub wrapped_blob: String,
}

impl ShareInitialContent {
    fn is_valid(&self) -> bool {
        self.share_index != 0 && self.threshold >= 2 && !self.wrapped_blob.is_empty()
    }
}

/// Content of a [`KIND_SHARE_RELEASE`] event: one blob per recipient,
/// keyed by the recipient's public key (hex).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareReleaseContent {
    pub share_index: u8,
    pub threshold: u8,
    pub encrypted_shares: BTreeMap<String, String>,
}

impl ShareReleaseContent {
    fn is_valid(&self) -> bool {
        self.share_index != 0
            && self.threshold >= 2
            && !self.encrypted_shares.is_empty()
            && self
                .encrypted_shares
                .iter()
                .all(|(pk, blob)| PublicKey::from_hex(pk).is_ok() && !blob.is_empty())
    }
}

/// `d`-tag value for per-share records: `<switch_id>:<index>`.
pub fn share_identifier(switch_id: &str, index: u8) -> String {
    format!("{}:{}", switch_id, index)
}

fn sign_tagged(
    keys: &Keys,
    kind: Kind,
    content: String,
    tags: Vec<Tag>,
    created_at: u64,
) -> Result<Event, RelayError> {
    EventBuilder::new(kind, content)
        .tags(tags)
        .custom_created_at(Timestamp::from(created_at))
        .sign_with_keys(keys)
        .map_err(|e| RelayError::InvalidEvent(e.to_string()))
}

/// Build the signed ciphertext record for a switch.
pub fn build_ciphertext_event(
    keys: &Keys,
    switch_id: &str,
    content: &CiphertextContent,
    created_at: u64,
) -> Result<Event, RelayError> {
    let json =
        serde_json::to_string(content).map_err(|e| RelayError::InvalidEvent(e.to_string()))?;
    sign_tagged(
        keys,
        KIND_CIPHERTEXT,
        json,
        vec![Tag::identifier(switch_id)],
        created_at,
    )
}

/// Build the signed initial share record for one guardian.
pub fn build_share_initial_event(
    keys: &Keys,
    switch_id: &str,
    guardian: &PublicKey,
    content: &ShareInitialContent,
    created_at: u64,
) -> Result<Event, RelayError> {
    let json =
        serde_json::to_string(content).map_err(|e| RelayError::InvalidEvent(e.to_string()))?;
    sign_tagged(
        keys,
        KIND_SHARE_INITIAL,
        json,
        vec![
            Tag::identifier(share_identifier(switch_id, content.share_index)),
            Tag::public_key(*guardian),
        ],
        created_at,
    )
}

/// Build a signed release record addressed to one recipient.
pub fn build_share_release_event(
    keys: &Keys,
    switch_id: &str,
    recipient: &PublicKey,
    content: &ShareReleaseContent,
    created_at: u64,
) -> Result<Event, RelayError> {
    let json =
        serde_json::to_string(content).map_err(|e| RelayError::InvalidEvent(e.to_string()))?;
    sign_tagged(
        keys,
        KIND_SHARE_RELEASE,
        json,
        vec![
            Tag::identifier(share_identifier(switch_id, content.share_index)),
            Tag::public_key(*recipient),
        ],
        created_at,
    )
}

/// Build a signed owner check-in event.
pub fn build_checkin_event(
    keys: &Keys,
    switch_id: &str,
    created_at: u64,
) -> Result<Event, RelayError> {
    sign_tagged(
        keys,
        KIND_CHECKIN,
        String::new(),
        vec![Tag::identifier(switch_id)],
        created_at,
    )
}

/// Build a signed owner cancellation marker.
pub fn build_cancel_event(
    keys: &Keys,
    switch_id: &str,
    created_at: u64,
) -> Result<Event, RelayError> {
    sign_tagged(
        keys,
        KIND_CANCEL,
        String::new(),
        vec![Tag::identifier(switch_id)],
        created_at,
    )
}

fn parse_content<T: serde::de::DeserializeOwned>(event: &Event, kind: Kind) -> Option<T> {
    if event.kind != kind {
        return None;
    }
    match serde_json::from_str(&event.content) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::debug!("skipping malformed event {}: {}", event.id, e);
            None
        }
    }
}

/// Parse and validate a ciphertext record; `None` means "treat as absent".
pub fn parse_ciphertext(event: &Event) -> Option<CiphertextContent> {
    parse_content::<CiphertextContent>(event, KIND_CIPHERTEXT).filter(|c| c.is_valid())
}

/// Parse and validate an initial share record.
pub fn parse_share_initial(event: &Event) -> Option<ShareInitialContent> {
    parse_content::<ShareInitialContent>(event, KIND_SHARE_INITIAL).filter(|c| c.is_valid())
}

/// Parse and validate a release record.
pub fn parse_share_release(event: &Event) -> Option<ShareReleaseContent> {
    parse_content::<ShareReleaseContent>(event, KIND_SHARE_RELEASE).filter(|c| c.is_valid())
}

/// Query shape understood by every [`crate::RelayTransport`].
///
/// A deliberately small subset of relay filtering: kind, author,
/// `d`-tag, `p`-tag, and a result limit. [`EventFilter::matches`] is the
/// reference semantics; [`EventFilter::to_filter`] maps onto the wire
/// protocol's filter object.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kind: Option<Kind>,
    pub author: Option<PublicKey>,
    pub identifier: Option<String>,
    pub pubkey: Option<PublicKey>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn author(mut self, author: PublicKey) -> Self {
        self.author = Some(author);
        self
    }

    /// Match on the `d` tag.
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Match on the `p` tag.
    pub fn pubkey(mut self, pubkey: PublicKey) -> Self {
        self.pubkey = Some(pubkey);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `event` satisfies every set criterion.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(kind) = self.kind {
            if event.kind != kind {
                return false;
            }
        }
        if let Some(author) = self.author {
            if event.pubkey != author {
                return false;
            }
        }
        if let Some(ref identifier) = self.identifier {
            if event.tags.identifier() != Some(identifier.as_str()) {
                return false;
            }
        }
        if let Some(pubkey) = self.pubkey {
            if !event.tags.public_keys().any(|pk| *pk == pubkey) {
                return false;
            }
        }
        true
    }

    /// Convert to the relay wire filter.
    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::new();
        if let Some(kind) = self.kind {
            filter = filter.kind(kind);
        }
        if let Some(author) = self.author {
            filter = filter.author(author);
        }
        if let Some(ref identifier) = self.identifier {
            filter = filter.custom_tag(
                SingleLetterTag::lowercase(Alphabet::D),
                identifier.clone(),
            );
        }
        if let Some(pubkey) = self.pubkey {
            filter = filter.pubkey(pubkey);
        }
        if let Some(limit) = self.limit {
            filter = filter.limit(limit);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ciphertext() -> CiphertextContent {
        CiphertextContent {
            ciphertext: hex::encode([0xAB; 48]),
            iv: hex::encode([1u8; 12]),
            auth_tag: hex::encode([2u8; 16]),
            salt: hex::encode([3u8; 16]),
            iterations: 600_000,
        }
    }

    #[test]
    fn test_ciphertext_event_roundtrip() {
        let keys = Keys::generate();
        let content = sample_ciphertext();

        let event =
            build_ciphertext_event(&keys, "cafebabe", &content, 1_700_000_000).unwrap();
        assert_eq!(event.kind, KIND_CIPHERTEXT);
        assert_eq!(event.tags.identifier(), Some("cafebabe"));
        assert_eq!(event.created_at.as_u64(), 1_700_000_000);
        assert!(event.verify().is_ok());

        let parsed = parse_ciphertext(&event).expect("valid content");
        assert_eq!(parsed.iterations, 600_000);
        assert_eq!(parsed.iv, content.iv);
    }

    #[test]
    fn test_share_initial_event_tags() {
        let keys = Keys::generate();
        let guardian = Keys::generate().public_key();
        let content = ShareInitialContent {
            share_index: 2,
            threshold: 3,
            wrapped_blob: "blob".into(),
        };

        let event =
            build_share_initial_event(&keys, "cafebabe", &guardian, &content, 42).unwrap();
        assert_eq!(event.tags.identifier(), Some("cafebabe:2"));
        assert!(event.tags.public_keys().any(|pk| *pk == guardian));

        let parsed = parse_share_initial(&event).unwrap();
        assert_eq!(parsed.share_index, 2);
        assert_eq!(parsed.threshold, 3);
    }

    #[test]
    fn test_release_event_roundtrip() {
        let keys = Keys::generate();
        let recipient = Keys::generate().public_key();
        let mut encrypted_shares = BTreeMap::new();
        encrypted_shares.insert(recipient.to_hex(), "wrapped".to_string());
        let content = ShareReleaseContent {
            share_index: 1,
            threshold: 3,
            encrypted_shares,
        };

        let event =
            build_share_release_event(&keys, "cafebabe", &recipient, &content, 42).unwrap();
        let parsed = parse_share_release(&event).unwrap();
        assert_eq!(parsed.encrypted_shares.len(), 1);
        assert!(parsed.encrypted_shares.contains_key(&recipient.to_hex()));
    }

    #[test]
    fn test_malformed_content_is_skipped() {
        let keys = Keys::generate();
        let event = EventBuilder::new(KIND_CIPHERTEXT, "not json at all")
            .tag(Tag::identifier("cafebabe"))
            .sign_with_keys(&keys)
            .unwrap();
        assert!(parse_ciphertext(&event).is_none());
    }

    #[test]
    fn test_invalid_fields_are_rejected() {
        let keys = Keys::generate();
        let mut content = sample_ciphertext();
        content.iv = "zz".repeat(12); // right length, not hex

        let json = serde_json::to_string(&content).unwrap();
        let event = EventBuilder::new(KIND_CIPHERTEXT, json)
            .tag(Tag::identifier("cafebabe"))
            .sign_with_keys(&keys)
            .unwrap();
        assert!(parse_ciphertext(&event).is_none());
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let keys = Keys::generate();
        let json = serde_json::to_string(&sample_ciphertext()).unwrap();
        let event = EventBuilder::new(KIND_CHECKIN, json)
            .tag(Tag::identifier("cafebabe"))
            .sign_with_keys(&keys)
            .unwrap();
        assert!(parse_ciphertext(&event).is_none());
    }

    #[test]
    fn test_release_with_bad_recipient_key_rejected() {
        let mut encrypted_shares = BTreeMap::new();
        encrypted_shares.insert("not-a-pubkey".to_string(), "blob".to_string());
        let content = ShareReleaseContent {
            share_index: 1,
            threshold: 3,
            encrypted_shares,
        };
        assert!(!content.is_valid());
    }

    #[test]
    fn test_filter_matching() {
        let keys = Keys::generate();
        let other = Keys::generate();
        let event = build_checkin_event(&keys, "cafebabe", 100).unwrap();

        assert!(EventFilter::new()
            .kind(KIND_CHECKIN)
            .author(keys.public_key())
            .identifier("cafebabe")
            .matches(&event));

        assert!(!EventFilter::new().kind(KIND_CANCEL).matches(&event));
        assert!(!EventFilter::new().author(other.public_key()).matches(&event));
        assert!(!EventFilter::new().identifier("deadbeef").matches(&event));
        assert!(!EventFilter::new().pubkey(other.public_key()).matches(&event));
    }

    #[test]
    fn test_share_identifier_format() {
        assert_eq!(share_identifier("abc123", 4), "abc123:4");
    }
}
