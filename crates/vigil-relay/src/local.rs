//! In-process relay set
//!
//! A deterministic implementation of [`RelayTransport`]: each node is an
//! append-only event store with an online/offline switch, so tests can
//! script partial outages without any network. Publish verifies the
//! event signature the way a real relay would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use nostr_sdk::Event;

use crate::events::EventFilter;
use crate::{PublishOutcome, RelayError, RelayTransport};

struct LocalNode {
    name: String,
    online: AtomicBool,
    store: Mutex<Vec<Event>>,
}

/// A bounded set of in-process relays.
pub struct LocalRelays {
    nodes: Vec<LocalNode>,
}

impl LocalRelays {
    /// Create `count` online nodes.
    pub fn new(count: usize) -> Self {
        let nodes = (0..count)
            .map(|i| LocalNode {
                name: format!("local-relay-{}", i),
                online: AtomicBool::new(true),
                store: Mutex::new(Vec::new()),
            })
            .collect();
        Self { nodes }
    }

    /// Take a node down (or bring it back). Offline nodes neither accept
    /// publishes nor answer queries, but keep their stored events.
    pub fn set_online(&self, node: usize, online: bool) {
        self.nodes[node].online.store(online, Ordering::SeqCst);
    }

    /// Number of events stored on one node.
    pub fn stored_count(&self, node: usize) -> usize {
        self.nodes[node].store.lock().unwrap().len()
    }

    /// Mutate one stored event in place on every node that has it.
    /// Exists so tests can simulate a tampering relay.
    pub fn corrupt_event<F>(&self, event_id: &nostr_sdk::EventId, mutate: F)
    where
        F: Fn(&mut Event),
    {
        for node in &self.nodes {
            let mut store = node.store.lock().unwrap();
            for event in store.iter_mut() {
                if event.id == *event_id {
                    mutate(event);
                }
            }
        }
    }
}

#[async_trait]
impl RelayTransport for LocalRelays {
    async fn publish(&self, event: Event) -> Result<PublishOutcome, RelayError> {
        event
            .verify()
            .map_err(|e| RelayError::InvalidEvent(e.to_string()))?;

        let mut accepted = Vec::new();
        let mut failed = Vec::new();

        for node in &self.nodes {
            if !node.online.load(Ordering::SeqCst) {
                failed.push(node.name.clone());
                continue;
            }
            let mut store = node.store.lock().unwrap();
            // Append-only with id dedup: replaying an event is a no-op
            if !store.iter().any(|e| e.id == event.id) {
                store.push(event.clone());
            }
            accepted.push(node.name.clone());
        }

        if accepted.is_empty() {
            return Err(RelayError::AllRelaysFailed(
                "no relay accepted the event".into(),
            ));
        }

        Ok(PublishOutcome {
            event_id: event.id,
            accepted,
            failed,
        })
    }

    async fn query(&self, filter: EventFilter) -> Result<Vec<Event>, RelayError> {
        let mut merged: Vec<Event> = Vec::new();
        let mut any_online = false;

        for node in &self.nodes {
            if !node.online.load(Ordering::SeqCst) {
                continue;
            }
            any_online = true;
            let store = node.store.lock().unwrap();
            for event in store.iter() {
                if filter.matches(event) && !merged.iter().any(|e| e.id == event.id) {
                    merged.push(event.clone());
                }
            }
        }

        if !any_online {
            return Err(RelayError::AllRelaysFailed("no relay reachable".into()));
        }

        // Newest first, the way callers expect stored events back
        merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            merged.truncate(limit);
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{build_checkin_event, KIND_CHECKIN};
    use nostr_sdk::Keys;

    #[tokio::test]
    async fn test_publish_reaches_every_online_node() {
        let relays = LocalRelays::new(3);
        let keys = Keys::generate();
        let event = build_checkin_event(&keys, "cafebabe", 100).unwrap();

        let outcome = relays.publish(event).await.unwrap();
        assert_eq!(outcome.accepted.len(), 3);
        assert!(outcome.fully_replicated());
        for node in 0..3 {
            assert_eq!(relays.stored_count(node), 1);
        }
    }

    #[tokio::test]
    async fn test_publish_is_idempotent_per_event_id() {
        let relays = LocalRelays::new(1);
        let keys = Keys::generate();
        let event = build_checkin_event(&keys, "cafebabe", 100).unwrap();

        relays.publish(event.clone()).await.unwrap();
        relays.publish(event).await.unwrap();
        assert_eq!(relays.stored_count(0), 1);
    }

    #[tokio::test]
    async fn test_partial_outage_tolerated() {
        let relays = LocalRelays::new(5);
        relays.set_online(0, false);
        relays.set_online(1, false);
        relays.set_online(2, false);

        let keys = Keys::generate();
        let event = build_checkin_event(&keys, "cafebabe", 100).unwrap();
        let outcome = relays.publish(event).await.unwrap();

        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.failed.len(), 3);
        assert!(!outcome.fully_replicated());
    }

    #[tokio::test]
    async fn test_total_outage_fails() {
        let relays = LocalRelays::new(2);
        relays.set_online(0, false);
        relays.set_online(1, false);

        let keys = Keys::generate();
        let event = build_checkin_event(&keys, "cafebabe", 100).unwrap();
        assert!(matches!(
            relays.publish(event).await,
            Err(RelayError::AllRelaysFailed(_))
        ));

        let filter = EventFilter::new().kind(KIND_CHECKIN);
        assert!(matches!(
            relays.query(filter).await,
            Err(RelayError::AllRelaysFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_query_merges_and_dedupes() {
        let relays = LocalRelays::new(3);
        let keys = Keys::generate();

        // First event lands everywhere; second only on node 2
        let first = build_checkin_event(&keys, "cafebabe", 100).unwrap();
        relays.publish(first).await.unwrap();

        relays.set_online(0, false);
        relays.set_online(1, false);
        let second = build_checkin_event(&keys, "cafebabe", 200).unwrap();
        relays.publish(second).await.unwrap();
        relays.set_online(0, true);
        relays.set_online(1, true);

        let events = relays
            .query(
                EventFilter::new()
                    .kind(KIND_CHECKIN)
                    .author(keys.public_key())
                    .identifier("cafebabe"),
            )
            .await
            .unwrap();

        // Union of all nodes, deduplicated, newest first
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].created_at.as_u64(), 200);
        assert_eq!(events[1].created_at.as_u64(), 100);
    }

    #[tokio::test]
    async fn test_query_limit() {
        let relays = LocalRelays::new(1);
        let keys = Keys::generate();
        for t in [100u64, 200, 300] {
            let event = build_checkin_event(&keys, "cafebabe", t).unwrap();
            relays.publish(event).await.unwrap();
        }

        let events = relays
            .query(EventFilter::new().kind(KIND_CHECKIN).limit(1))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].created_at.as_u64(), 300);
    }

    #[tokio::test]
    async fn test_unsigned_garbage_rejected() {
        let relays = LocalRelays::new(1);
        let keys = Keys::generate();
        let mut event = build_checkin_event(&keys, "cafebabe", 100).unwrap();
        event.content = "tampered".into();

        assert!(matches!(
            relays.publish(event).await,
            Err(RelayError::InvalidEvent(_))
        ));
    }
}
