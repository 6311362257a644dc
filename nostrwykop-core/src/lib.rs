//! NostrWykop core — the event-to-domain aggregation engine.
//!
//! Translates flat, relay-queried streams of signed Nostr events into the
//! domain model a social-aggregator UI consumes: posts, comment trees,
//! vote tallies, profiles, follow graphs and encrypted direct-message
//! threads. Every read re-derives its result from a fresh relay query;
//! there is no cross-request cache, so results are exactly as consistent
//! as the relays' current event set.
//!
//! The engine is written against two narrow seams: a [`RelayPool`] for
//! bulk fetch/publish and an [`EventSigner`] for signing and NIP-04
//! encryption. Both are injected at construction; read paths work without
//! a signer, write paths refuse to run without one.

mod client;
mod error;
mod feed;
mod messages;
mod post;
mod profile;
mod relay;
mod scoring;
mod signer;
mod social;
mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{ClientConfig, NostrWykop};
pub use error::{Error, Result};
pub use feed::{FeedOptions, MatchReason, SearchHit};
pub use messages::{Conversation, DirectMessage, DECRYPT_FAILED_PLACEHOLDER};
pub use post::{parse_post_event, Comment, Post, PostFragment, NO_TITLE};
pub use profile::{Profile, ProfileUpdate};
pub use relay::{NostrPool, RelayPool};
pub use scoring::{hot_score, sort_posts, tally_reactions, SortBy};
pub use signer::{EventSigner, KeysSigner};
pub use util::normalize_pubkey;

// Re-export the protocol SDK so downstream crates share one version.
pub use nostr_sdk;
