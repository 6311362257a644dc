//! Relay pool seam.
//!
//! The engine only ever talks to relays through [`RelayPool`]: a bulk fetch
//! and a fire-and-forget publish. [`NostrPool`] is the production
//! implementation on top of `nostr_sdk::Client`; tests substitute an
//! in-memory pool.

use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::prelude::*;

use crate::error::{Error, Result};

/// Narrow relay capability the aggregation engine is written against.
#[async_trait]
pub trait RelayPool: Send + Sync {
    /// Establish relay connections. Must be called before any query/publish.
    async fn connect(&self) -> Result<()>;

    /// Bulk-fetch every stored event matching the filter.
    async fn query(&self, filter: Filter) -> Result<Vec<Event>>;

    /// Broadcast a signed event. A single relay accepting counts as success.
    async fn publish(&self, event: &Event) -> Result<()>;

    /// Tear down relay connections.
    async fn shutdown(&self);
}

/// Production pool backed by a `nostr_sdk::Client`.
///
/// Every query carries an explicit timeout; a relay that never answers
/// cannot wedge a caller.
pub struct NostrPool {
    client: Client,
    relays: Vec<String>,
    timeout: Duration,
}

impl NostrPool {
    pub fn new(relays: Vec<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .opts(ClientOptions::new())
            .build();
        Self {
            client,
            relays,
            timeout,
        }
    }
}

#[async_trait]
impl RelayPool for NostrPool {
    async fn connect(&self) -> Result<()> {
        for relay in &self.relays {
            self.client
                .add_relay(relay.as_str())
                .await
                .map_err(|e| Error::Relay(e.to_string()))?;
        }
        self.client.connect().await;
        Ok(())
    }

    async fn query(&self, filter: Filter) -> Result<Vec<Event>> {
        let events = self
            .client
            .fetch_events(filter, self.timeout)
            .await
            .map_err(|e| Error::Relay(e.to_string()))?;
        Ok(events.into_iter().collect())
    }

    async fn publish(&self, event: &Event) -> Result<()> {
        self.client
            .send_event(event)
            .await
            .map_err(|e| Error::Relay(e.to_string()))?;
        Ok(())
    }

    async fn shutdown(&self) {
        self.client.disconnect().await;
    }
}
