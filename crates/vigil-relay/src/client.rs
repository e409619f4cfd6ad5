//! Relay pool client
//!
//! Wraps a multi-relay client: publishes fan out to every configured
//! relay in parallel and succeed on the first ack; queries stream each
//! relay until end-of-stored-events or the per-relay budget, then merge
//! and deduplicate. A relay that errors or times out is logged and
//! excluded from that call — it never fails the call on its own.

use async_trait::async_trait;
use nostr_sdk::prelude::*;

use crate::events::EventFilter;
use crate::{PublishOutcome, RelayError, RelayTransport, OVERALL_TIMEOUT, PER_RELAY_TIMEOUT};

/// A connected set of relays sharing one signing identity.
pub struct RelayPool {
    client: Client,
    relay_urls: Vec<String>,
}

impl RelayPool {
    /// Connect to the configured relay set.
    ///
    /// The set is fixed for the lifetime of the pool; reconfiguration
    /// means building a new pool and swapping it in atomically.
    pub async fn connect(keys: Keys, relay_urls: Vec<String>) -> Result<Self, RelayError> {
        if relay_urls.is_empty() {
            return Err(RelayError::InvalidConfig("no relays configured".into()));
        }

        let client = Client::new(keys);
        for url in &relay_urls {
            client
                .add_relay(url.as_str())
                .await
                .map_err(|e| RelayError::InvalidConfig(format!("relay {}: {}", url, e)))?;
        }
        client.connect().await;

        Ok(Self { client, relay_urls })
    }

    pub fn relay_urls(&self) -> &[String] {
        &self.relay_urls
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }
}

#[async_trait]
impl RelayTransport for RelayPool {
    async fn publish(&self, event: Event) -> Result<PublishOutcome, RelayError> {
        let send = self.client.send_event(&event);
        let output = tokio::time::timeout(OVERALL_TIMEOUT, send)
            .await
            .map_err(|_| RelayError::Timeout)?
            .map_err(|e| RelayError::AllRelaysFailed(e.to_string()))?;

        let accepted: Vec<String> = output.success.iter().map(|url| url.to_string()).collect();
        let failed: Vec<String> = output.failed.keys().map(|url| url.to_string()).collect();

        for url in &failed {
            log::warn!("relay {} rejected event {}", url, event.id);
        }

        Ok(PublishOutcome {
            event_id: *output.id(),
            accepted,
            failed,
        })
    }

    async fn query(&self, filter: EventFilter) -> Result<Vec<Event>, RelayError> {
        // fetch_events runs one subscription per relay until EOSE or the
        // per-relay budget, then merges and dedupes by event id.
        let fetch = self.client.fetch_events(filter.to_filter(), PER_RELAY_TIMEOUT);
        let events = tokio::time::timeout(OVERALL_TIMEOUT, fetch)
            .await
            .map_err(|_| RelayError::Timeout)?
            .map_err(|e| RelayError::AllRelaysFailed(e.to_string()))?;

        Ok(events.into_iter().collect())
    }
}
