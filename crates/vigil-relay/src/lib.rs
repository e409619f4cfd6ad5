//! Vigil Relay Module
//!
//! Publish/subscribe plumbing over a bounded set of untrusted Nostr
//! relays. Every record the system distributes — ciphertext, wrapped
//! shares, check-ins, cancellations — is a signed append-only event;
//! this crate owns the event schemas and the fan-out client.
//!
//! No ordering is assumed across relays: queries merge the union of
//! whatever each relay returns, deduplicated by event id, and callers
//! reconstruct order from `created_at`.

pub mod client;
pub mod events;
pub mod local;

use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::{Event, EventId};
use thiserror::Error;

pub use client::RelayPool;
pub use events::EventFilter;
pub use local::LocalRelays;

/// Per-relay budget for a single subscription.
pub const PER_RELAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Budget for an encompassing publish or query call.
pub const OVERALL_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Error, Debug)]
pub enum RelayError {
    /// The overall call budget elapsed. Retriable.
    #[error("relay operation timed out")]
    Timeout,
    /// Every relay in the set rejected or failed the call.
    #[error("all relays failed: {0}")]
    AllRelaysFailed(String),
    #[error("invalid relay configuration: {0}")]
    InvalidConfig(String),
    #[error("event rejected: {0}")]
    InvalidEvent(String),
}

/// Result of broadcasting one event to the relay set.
///
/// Success means at least one relay acknowledged; the rest of the set is
/// best-effort and reported for logging.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub event_id: EventId,
    pub accepted: Vec<String>,
    pub failed: Vec<String>,
}

impl PublishOutcome {
    pub fn fully_replicated(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The transport seam between the protocol engines and the relay set.
///
/// Implemented by [`RelayPool`] for real relays and [`LocalRelays`] for
/// deterministic in-process testing. A branch failure never cancels its
/// siblings; a call fails only when every relay fails.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Broadcast a signed event to every relay; ≥1 ack is success.
    async fn publish(&self, event: Event) -> Result<PublishOutcome, RelayError>;

    /// Fetch all stored events matching `filter`, merged across relays
    /// and deduplicated by event id.
    async fn query(&self, filter: EventFilter) -> Result<Vec<Event>, RelayError>;
}
