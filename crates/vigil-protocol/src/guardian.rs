//! Guardian release protocol
//!
//! Each guardian runs this independently: poll the relays for the
//! owner's freshest check-in, and once the switch is overdue past the
//! grace window — with no cancellation marker in sight — unwrap its own
//! share and re-wrap it to every recipient. No coordination between
//! guardians; recovery takes the first threshold of whatever arrives.

use std::collections::HashMap;

use nostr_sdk::{EventId, Keys, PublicKey};
use zeroize::Zeroizing;

use vigil_core::envelope::{self, EnvelopeError};
use vigil_relay::events::{
    build_share_release_event, parse_share_initial, share_identifier, EventFilter, KIND_CANCEL,
    KIND_CHECKIN, KIND_SHARE_INITIAL, KIND_SHARE_RELEASE, ShareReleaseContent,
};
use vigil_relay::{RelayError, RelayTransport};
use vigil_shamir::{decode_share, encode_share, ShamirError};
use vigil_switch::{Clock, Switch};

/// Slack added to the interval before any guardian releases: an owner
/// who is merely late still has this long to check in.
pub const GRACE_SECS: u64 = 3_600;

#[derive(thiserror::Error, Debug)]
pub enum GuardianError {
    #[error("this key is not in the switch's guardian set")]
    NotAGuardian,

    #[error("no wrapped share found for index {index}")]
    MissingShare { index: u8 },

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Shamir(#[from] ShamirError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Last veto before shares go out. External timelock integrations hook
/// in here; the default authorizes unconditionally.
pub trait ReleaseHook: Send + Sync {
    fn authorize(&self, switch_id: &str, now: u64) -> bool;
}

/// The default hook: always authorize.
pub struct NoHook;

impl ReleaseHook for NoHook {
    fn authorize(&self, _switch_id: &str, _now: u64) -> bool {
        true
    }
}

/// What one polling cycle concluded.
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Switch not yet overdue past grace.
    Waiting,
    /// A fresher check-in than the previous cycle's observation arrived;
    /// this cycle's release decision is aborted.
    Aborted,
    /// A valid cancellation marker is present; never release.
    Cancelled,
    /// The hook vetoed the release.
    Vetoed,
    /// Shares already published to every recipient in an earlier cycle.
    AlreadyReleased,
    /// Shares published now, one event per recipient.
    Released(Vec<EventId>),
}

/// One guardian's poller and release engine.
pub struct GuardianNode {
    keys: Keys,
    grace_secs: u64,
    /// Per-switch check-in observation backing the previous decision.
    last_observed: HashMap<String, u64>,
}

impl GuardianNode {
    pub fn new(keys: Keys) -> Self {
        Self {
            keys,
            grace_secs: GRACE_SECS,
            last_observed: HashMap::new(),
        }
    }

    pub fn with_grace(keys: Keys, grace_secs: u64) -> Self {
        Self {
            keys,
            grace_secs,
            last_observed: HashMap::new(),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    /// Run one full observe-decide-release cycle for `switch`.
    pub async fn run_cycle(
        &mut self,
        switch: &Switch,
        relay: &impl RelayTransport,
        clock: &impl Clock,
        hook: &impl ReleaseHook,
    ) -> Result<CycleOutcome, GuardianError> {
        let my_index = switch
            .guardians
            .iter()
            .find(|g| g.pubkey == self.keys.public_key())
            .map(|g| g.index)
            .ok_or(GuardianError::NotAGuardian)?;

        let switch_id = switch.id.to_string();
        let now = clock.now();

        if observe_cancel(switch, relay).await? {
            log::info!("switch {} is cancelled; standing down", switch_id);
            return Ok(CycleOutcome::Cancelled);
        }

        // The freshest liveness signal wins: the seal itself counts as the
        // first check-in.
        let observed = observe_latest_checkin(switch, relay)
            .await?
            .map_or(switch.created_at, |t| t.max(switch.created_at));

        let previous = self.last_observed.insert(switch_id.clone(), observed);
        let fresher = matches!(previous, Some(p) if observed > p);

        if now < observed + switch.interval_secs + self.grace_secs {
            return Ok(CycleOutcome::Waiting);
        }

        // A fresher observation than the one behind our previous decision
        // aborts this cycle's release even though the switch is overdue.
        if fresher {
            log::debug!(
                "switch {}: fresher check-in observed; aborting release this cycle",
                switch_id
            );
            return Ok(CycleOutcome::Aborted);
        }

        if !hook.authorize(&switch_id, now) {
            log::info!("release hook vetoed switch {}", switch_id);
            return Ok(CycleOutcome::Vetoed);
        }

        if self.already_released(switch, relay, my_index).await? {
            return Ok(CycleOutcome::AlreadyReleased);
        }

        let events = self.release(switch, relay, my_index, now).await?;
        log::info!(
            "released share {} of switch {} to {} recipient(s)",
            my_index,
            switch_id,
            events.len()
        );
        Ok(CycleOutcome::Released(events))
    }

    /// Whether this guardian has already published a release for every
    /// recipient of the switch.
    async fn already_released(
        &self,
        switch: &Switch,
        relay: &impl RelayTransport,
        my_index: u8,
    ) -> Result<bool, GuardianError> {
        let filter = EventFilter::new()
            .kind(KIND_SHARE_RELEASE)
            .author(self.keys.public_key())
            .identifier(share_identifier(&switch.id.to_string(), my_index));
        let events = relay.query(filter).await?;
        Ok(events.len() >= switch.recipients.len())
    }

    /// Fetch the own wrapped share, unwrap it, and republish it sealed
    /// to each recipient.
    async fn release(
        &self,
        switch: &Switch,
        relay: &impl RelayTransport,
        my_index: u8,
        now: u64,
    ) -> Result<Vec<EventId>, GuardianError> {
        let switch_id = switch.id.to_string();

        let filter = EventFilter::new()
            .kind(KIND_SHARE_INITIAL)
            .author(switch.owner)
            .identifier(share_identifier(&switch_id, my_index))
            .pubkey(self.keys.public_key());
        let events = relay.query(filter).await?;

        let content = events
            .iter()
            .find_map(parse_share_initial)
            .ok_or(GuardianError::MissingShare { index: my_index })?;

        // Unwrap and checksum the share before passing it on; a corrupt
        // share is worth knowing about now, not at recovery time.
        let encoded = Zeroizing::new(envelope::open(
            &content.wrapped_blob,
            &switch.owner,
            &self.keys,
        )?);
        let mut share = decode_share(&encoded)?;
        if share.index != my_index {
            return Err(GuardianError::MissingShare { index: my_index });
        }

        let mut published = Vec::with_capacity(switch.recipients.len());
        for recipient in &switch.recipients {
            let reencoded = Zeroizing::new(encode_share(&share));
            let blob = envelope::seal(&reencoded, &self.keys, &recipient.pubkey)?;

            let mut encrypted_shares = std::collections::BTreeMap::new();
            encrypted_shares.insert(recipient.pubkey.to_hex(), blob);
            let release = ShareReleaseContent {
                share_index: my_index,
                threshold: content.threshold,
                encrypted_shares,
            };

            let event = build_share_release_event(
                &self.keys,
                &switch_id,
                &recipient.pubkey,
                &release,
                now,
            )?;
            let outcome = relay.publish(event).await?;
            published.push(outcome.event_id);
        }

        use zeroize::Zeroize;
        share.zeroize();

        Ok(published)
    }
}

/// Max `created_at` among the owner's check-in events for `switch`,
/// merged across relays. `None` when no check-in has ever been seen.
pub async fn observe_latest_checkin(
    switch: &Switch,
    relay: &impl RelayTransport,
) -> Result<Option<u64>, RelayError> {
    let filter = EventFilter::new()
        .kind(KIND_CHECKIN)
        .author(switch.owner)
        .identifier(switch.id.to_string());
    let events = relay.query(filter).await?;
    Ok(events.iter().map(|e| e.created_at.as_u64()).max())
}

/// Whether a valid owner-signed cancellation marker exists for `switch`.
pub async fn observe_cancel(
    switch: &Switch,
    relay: &impl RelayTransport,
) -> Result<bool, RelayError> {
    let filter = EventFilter::new()
        .kind(KIND_CANCEL)
        .author(switch.owner)
        .identifier(switch.id.to_string())
        .limit(1);
    let events = relay.query(filter).await?;
    Ok(!events.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_relay::LocalRelays;
    use vigil_switch::{switch::guardians_from_pubkeys, FixedClock, Recipient};

    fn build_switch(owner: &Keys, guardian_keys: &[Keys], interval: u64, now: u64) -> Switch {
        let pubkeys: Vec<_> = guardian_keys.iter().map(|k| k.public_key()).collect();
        Switch::new(
            owner.public_key(),
            "guarded switch",
            interval,
            vec![Recipient {
                name: "r".into(),
                email: None,
                pubkey: Keys::generate().public_key(),
            }],
            guardians_from_pubkeys(&pubkeys),
            3,
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_not_a_guardian() {
        let owner = Keys::generate();
        let guardian_keys: Vec<Keys> = (0..5).map(|_| Keys::generate()).collect();
        let switch = build_switch(&owner, &guardian_keys, 3_600, 1_000_000);
        let relays = LocalRelays::new(1);
        let clock = FixedClock::new(1_000_000);

        let mut stranger = GuardianNode::new(Keys::generate());
        let result = stranger.run_cycle(&switch, &relays, &clock, &NoHook).await;
        assert!(matches!(result, Err(GuardianError::NotAGuardian)));
    }

    #[tokio::test]
    async fn test_waits_before_grace() {
        let owner = Keys::generate();
        let guardian_keys: Vec<Keys> = (0..5).map(|_| Keys::generate()).collect();
        let switch = build_switch(&owner, &guardian_keys, 3_600, 1_000_000);
        let relays = LocalRelays::new(1);

        // Interval elapsed but still inside grace
        let clock = FixedClock::new(1_000_000 + 3_600 + GRACE_SECS - 1);
        let mut node = GuardianNode::new(guardian_keys[0].clone());
        let outcome = node
            .run_cycle(&switch, &relays, &clock, &NoHook)
            .await
            .unwrap();
        assert_eq!(outcome, CycleOutcome::Waiting);
    }

    #[tokio::test]
    async fn test_hook_veto() {
        struct Veto;
        impl ReleaseHook for Veto {
            fn authorize(&self, _switch_id: &str, _now: u64) -> bool {
                false
            }
        }

        let owner = Keys::generate();
        let guardian_keys: Vec<Keys> = (0..5).map(|_| Keys::generate()).collect();
        let switch = build_switch(&owner, &guardian_keys, 3_600, 1_000_000);
        let relays = LocalRelays::new(1);
        let clock = FixedClock::new(1_000_000 + 3_600 + GRACE_SECS);

        let mut node = GuardianNode::new(guardian_keys[0].clone());
        let outcome = node.run_cycle(&switch, &relays, &clock, &Veto).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Vetoed);
    }

    #[tokio::test]
    async fn test_fresh_checkin_aborts_cycle() {
        let owner = Keys::generate();
        let guardian_keys: Vec<Keys> = (0..5).map(|_| Keys::generate()).collect();
        let switch = build_switch(&owner, &guardian_keys, 3_600, 1_000_000);
        let relays = LocalRelays::new(1);
        let clock = FixedClock::new(1_000_000 + 3_600 + GRACE_SECS);

        let mut node = GuardianNode::new(guardian_keys[0].clone());
        // First cycle: no share record on the relays, so the release path
        // errors with MissingShare — but only after the decision passed.
        let result = node.run_cycle(&switch, &relays, &clock, &NoHook).await;
        assert!(matches!(result, Err(GuardianError::MissingShare { .. })));

        // A check-in lands (old enough that the switch is still overdue)
        let checkin = vigil_relay::events::build_checkin_event(
            &owner,
            &switch.id.to_string(),
            1_000_100,
        )
        .unwrap();
        relays.publish(checkin).await.unwrap();

        // The fresher observation aborts this cycle outright (the clock
        // is far enough along that the switch is still overdue)
        clock.advance(200);
        let outcome = node
            .run_cycle(&switch, &relays, &clock, &NoHook)
            .await
            .unwrap();
        assert_eq!(outcome, CycleOutcome::Aborted);
    }
}
