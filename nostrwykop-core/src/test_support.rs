//! In-memory relay pool and event-building helpers shared by the unit
//! tests. Compiled only for `cfg(test)`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nostr_sdk::prelude::*;

use crate::client::{ClientConfig, NostrWykop};
use crate::error::Result;
use crate::relay::RelayPool;
use crate::signer::{EventSigner, KeysSigner};

/// Relay pool over a plain event vector, honoring the filter fields the
/// engine actually uses: ids, authors, kinds, since, until, limit and the
/// single-letter tag constraints (#e/#p/#t).
pub(crate) struct MemoryPool {
    events: Mutex<Vec<Event>>,
    published: Mutex<Vec<Event>>,
}

impl MemoryPool {
    pub(crate) fn new(events: Vec<Event>) -> Self {
        Self {
            events: Mutex::new(events),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Everything published through this pool, in publish order.
    pub(crate) fn published(&self) -> Vec<Event> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayPool for MemoryPool {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn query(&self, filter: Filter) -> Result<Vec<Event>> {
        let events = self.events.lock().unwrap();
        let mut matched: Vec<Event> = events
            .iter()
            .filter(|e| matches_filter(&filter, e))
            .cloned()
            .collect();
        // Relays serve newest-first within a limited window
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn publish(&self, event: &Event) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn shutdown(&self) {}
}

fn matches_filter(filter: &Filter, event: &Event) -> bool {
    if let Some(ids) = &filter.ids {
        if !ids.contains(&event.id) {
            return false;
        }
    }
    if let Some(authors) = &filter.authors {
        if !authors.contains(&event.pubkey) {
            return false;
        }
    }
    if let Some(kinds) = &filter.kinds {
        if !kinds.contains(&event.kind) {
            return false;
        }
    }
    if let Some(since) = filter.since {
        if event.created_at < since {
            return false;
        }
    }
    if let Some(until) = filter.until {
        if event.created_at > until {
            return false;
        }
    }
    for (letter, wanted) in filter.generic_tags.iter() {
        let name = letter.to_string();
        let present = event.tags.iter().any(|tag| {
            let values = tag.as_slice();
            values.len() >= 2 && values[0] == name && wanted.contains(&values[1])
        });
        if !present {
            return false;
        }
    }
    true
}

/// Signed event with an explicit creation time.
pub(crate) fn raw_event(
    keys: &Keys,
    kind: Kind,
    content: &str,
    tags: Vec<Tag>,
    secs: u64,
) -> Event {
    EventBuilder::new(kind, content)
        .tags(tags)
        .custom_created_at(Timestamp::from_secs(secs))
        .sign_with_keys(keys)
        .unwrap()
}

/// Kind-0 metadata event with raw JSON content.
pub(crate) fn metadata_event(keys: &Keys, json: &str, secs: u64) -> Event {
    raw_event(keys, Kind::Metadata, json, Vec::new(), secs)
}

/// Engine over a memory pool, not yet connected.
pub(crate) fn engine(events: Vec<Event>, keys: Option<Keys>) -> (NostrWykop, Arc<MemoryPool>) {
    let pool = Arc::new(MemoryPool::new(events));
    let signer = keys.map(|k| Arc::new(KeysSigner::new(k)) as Arc<dyn EventSigner>);
    let client = NostrWykop::new(pool.clone(), signer, ClientConfig::default());
    (client, pool)
}

/// Connected engine without a signer (read paths only).
pub(crate) async fn read_only_engine(events: Vec<Event>) -> NostrWykop {
    let (client, _pool) = engine(events, None);
    client.connect().await.unwrap();
    client
}

/// Connected engine with a local key pair attached.
pub(crate) async fn signed_engine(
    events: Vec<Event>,
    keys: Keys,
) -> (NostrWykop, Arc<MemoryPool>) {
    let (client, pool) = engine(events, Some(keys));
    client.connect().await.unwrap();
    (client, pool)
}
