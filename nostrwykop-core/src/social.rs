//! Follow-graph resolution and mutation.
//!
//! Kind-3 contact lists are replaceable events: only the newest list from an
//! author counts, and every mutation republishes the whole list. Mutations
//! are serialized through the engine's follow lock so a session cannot race
//! itself into a lost update; the protocol offers no cross-client guard.

use futures_util::future::try_join_all;
use nostr_sdk::prelude::*;

use crate::client::NostrWykop;
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::util::{normalize_pubkey, parse_pubkey};

impl NostrWykop {
    /// The canonical following set of a pubkey: the "p" entries of their
    /// newest kind-3 event, in list order. Hex keys out.
    pub async fn get_following(&self, pubkey: &str) -> Result<Vec<String>> {
        self.ensure_connected()?;
        let pk = match parse_pubkey(pubkey) {
            Some(pk) => pk,
            None => return Ok(Vec::new()),
        };

        Ok(match self.latest_contact_list(pk).await? {
            Some(event) => contact_entries(&event),
            None => Vec::new(),
        })
    }

    /// Approximate follower set: the authors of every discoverable kind-3
    /// event referencing the key, bounded by the follower scan window.
    /// Each author counts once even when stale superseded lists of theirs
    /// are still floating around the relays.
    pub async fn get_followers(&self, pubkey: &str) -> Result<Vec<String>> {
        self.ensure_connected()?;
        let pk = match parse_pubkey(pubkey) {
            Some(pk) => pk,
            None => return Ok(Vec::new()),
        };

        let filter = Filter::new()
            .kind(Kind::ContactList)
            .pubkey(pk)
            .limit(self.config.follower_scan_limit);
        let events = self.pool.query(filter).await?;

        let mut seen = std::collections::HashSet::new();
        let mut followers = Vec::new();
        for event in &events {
            let hex = event.pubkey.to_hex();
            if seen.insert(hex.clone()) {
                followers.push(hex);
            }
        }
        Ok(followers)
    }

    /// Following set resolved into full profiles, in list order.
    pub async fn get_following_profiles(&self, pubkey: &str) -> Result<Vec<Profile>> {
        let following = self.get_following(pubkey).await?;
        try_join_all(following.iter().map(|pk| self.get_profile(pk))).await
    }

    /// Approximate follower set resolved into full profiles.
    pub async fn get_followers_profiles(&self, pubkey: &str) -> Result<Vec<Profile>> {
        let followers = self.get_followers(pubkey).await?;
        try_join_all(followers.iter().map(|pk| self.get_profile(pk))).await
    }

    pub async fn is_following(&self, pubkey: &str, target: &str) -> Result<bool> {
        let target_hex = normalize_pubkey(target);
        let following = self.get_following(pubkey).await?;
        Ok(following.iter().any(|pk| *pk == target_hex))
    }

    /// Add a key to our own follow list and republish the whole list.
    /// Following an already-followed key is a successful no-op.
    pub async fn follow(&self, target: &str) -> Result<()> {
        self.ensure_connected()?;
        let signer = self.require_signer()?.clone();
        let target_pk = parse_pubkey(target)
            .ok_or_else(|| Error::InvalidKey(target.to_string()))?;

        // One in-flight list mutation per session
        let _guard = self.follow_lock.lock().await;

        let my_pk = signer.public_key().await?;
        let mut tags = match self.latest_contact_list(my_pk).await? {
            Some(event) => contact_tags(&event),
            None => Vec::new(),
        };

        let target_hex = target_pk.to_hex();
        if tags.iter().any(|t| tag_pubkey(t) == Some(target_hex.as_str())) {
            // Already following
            return Ok(());
        }
        tags.push(Tag::public_key(target_pk));

        let event = signer
            .sign(EventBuilder::new(Kind::ContactList, "").tags(tags))
            .await?;
        self.pool.publish(&event).await
    }

    /// Remove a key from our own follow list and republish the whole list.
    /// Unfollowing a key that was never present is a successful no-op and
    /// publishes nothing.
    pub async fn unfollow(&self, target: &str) -> Result<()> {
        self.ensure_connected()?;
        let signer = self.require_signer()?.clone();
        let target_pk = parse_pubkey(target)
            .ok_or_else(|| Error::InvalidKey(target.to_string()))?;

        let _guard = self.follow_lock.lock().await;

        let my_pk = signer.public_key().await?;
        let tags = match self.latest_contact_list(my_pk).await? {
            Some(event) => contact_tags(&event),
            None => return Ok(()),
        };

        let target_hex = target_pk.to_hex();
        let updated: Vec<Tag> = tags
            .iter()
            .filter(|t| tag_pubkey(t) != Some(target_hex.as_str()))
            .cloned()
            .collect();
        if updated.len() == tags.len() {
            // Was never followed
            return Ok(());
        }

        let event = signer
            .sign(EventBuilder::new(Kind::ContactList, "").tags(updated))
            .await?;
        self.pool.publish(&event).await
    }

    /// Newest kind-3 event authored by the key, if any.
    async fn latest_contact_list(&self, pk: PublicKey) -> Result<Option<Event>> {
        let filter = Filter::new().author(pk).kind(Kind::ContactList);
        let mut events = self.pool.query(filter).await?;
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events.into_iter().next())
    }
}

/// The "p" tags of a contact list, preserving relay hints and petnames.
fn contact_tags(event: &Event) -> Vec<Tag> {
    event
        .tags
        .iter()
        .filter(|t| tag_pubkey(t).is_some())
        .cloned()
        .collect()
}

/// The followed pubkeys of a contact list, in list order.
fn contact_entries(event: &Event) -> Vec<String> {
    event
        .tags
        .iter()
        .filter_map(|t| tag_pubkey(t).map(str::to_string))
        .collect()
}

fn tag_pubkey(tag: &Tag) -> Option<&str> {
    let values = tag.as_slice();
    if values.len() >= 2 && values[0] == "p" {
        Some(values[1].as_str())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{raw_event, read_only_engine, signed_engine};

    fn contact_list(keys: &Keys, following: &[&PublicKey], secs: u64) -> Event {
        let tags: Vec<Tag> = following.iter().map(|pk| Tag::public_key(**pk)).collect();
        raw_event(keys, Kind::ContactList, "", tags, secs)
    }

    #[tokio::test]
    async fn test_following_reads_latest_list_only() {
        let me = Keys::generate();
        let a = Keys::generate();
        let b = Keys::generate();
        let stale = contact_list(&me, &[&a.public_key()], 100);
        let fresh = contact_list(&me, &[&b.public_key()], 200);
        let client = read_only_engine(vec![stale, fresh]).await;

        let following = client.get_following(&me.public_key().to_hex()).await.unwrap();
        assert_eq!(following, vec![b.public_key().to_hex()]);
    }

    #[tokio::test]
    async fn test_follow_appends_and_is_idempotent() {
        let me = Keys::generate();
        let target = Keys::generate();
        let (client, pool) = signed_engine(Vec::new(), me.clone()).await;

        client.follow(&target.public_key().to_hex()).await.unwrap();
        assert_eq!(pool.published().len(), 1);

        // Second follow sees the list we just published and becomes a no-op
        client.follow(&target.public_key().to_hex()).await.unwrap();
        assert_eq!(pool.published().len(), 1);

        let following = client.get_following(&me.public_key().to_hex()).await.unwrap();
        assert_eq!(following, vec![target.public_key().to_hex()]);
    }

    #[tokio::test]
    async fn test_follow_accepts_npub_input() {
        let me = Keys::generate();
        let target = Keys::generate();
        let (client, _pool) = signed_engine(Vec::new(), me.clone()).await;

        let npub = target.public_key().to_bech32().unwrap();
        client.follow(&npub).await.unwrap();

        assert!(client
            .is_following(&me.public_key().to_hex(), &npub)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unfollow_removes_only_the_target() {
        let me = Keys::generate();
        let a = Keys::generate();
        let b = Keys::generate();
        let seed = contact_list(&me, &[&a.public_key(), &b.public_key()], 100);
        let (client, _pool) = signed_engine(vec![seed], me.clone()).await;

        client.unfollow(&a.public_key().to_hex()).await.unwrap();

        let following = client.get_following(&me.public_key().to_hex()).await.unwrap();
        assert_eq!(following, vec![b.public_key().to_hex()]);
    }

    #[tokio::test]
    async fn test_unfollow_of_non_followed_publishes_nothing() {
        let me = Keys::generate();
        let a = Keys::generate();
        let stranger = Keys::generate();
        let seed = contact_list(&me, &[&a.public_key()], 100);
        let (client, pool) = signed_engine(vec![seed], me.clone()).await;

        client.unfollow(&stranger.public_key().to_hex()).await.unwrap();
        assert_eq!(pool.published().len(), 0);

        let following = client.get_following(&me.public_key().to_hex()).await.unwrap();
        assert_eq!(following, vec![a.public_key().to_hex()]);
    }

    #[tokio::test]
    async fn test_followers_deduplicates_stale_lists() {
        let target = Keys::generate();
        let follower = Keys::generate();
        let other = Keys::generate();
        let stale = contact_list(&follower, &[&target.public_key()], 100);
        let fresh = contact_list(&follower, &[&target.public_key()], 200);
        let second = contact_list(&other, &[&target.public_key()], 150);
        let client = read_only_engine(vec![stale, fresh, second]).await;

        let followers = client.get_followers(&target.public_key().to_hex()).await.unwrap();
        assert_eq!(followers.len(), 2);
    }

    #[tokio::test]
    async fn test_following_profiles_resolve_in_list_order() {
        let me = Keys::generate();
        let a = Keys::generate();
        let b = Keys::generate();
        let contacts = contact_list(&me, &[&a.public_key(), &b.public_key()], 100);
        let a_meta = raw_event(&a, Kind::Metadata, r#"{"name":"alice"}"#, Vec::new(), 110);
        let client = read_only_engine(vec![contacts, a_meta]).await;

        let profiles = client
            .get_following_profiles(&me.public_key().to_hex())
            .await
            .unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name.as_deref(), Some("alice"));
        // A key without metadata still yields its empty profile
        assert_eq!(profiles[1].name, None);
        assert_eq!(profiles[1].pubkey, b.public_key().to_hex());
    }

    #[tokio::test]
    async fn test_follow_rejects_undecodable_key() {
        let me = Keys::generate();
        let (client, pool) = signed_engine(Vec::new(), me).await;

        let err = client.follow("npub1broken").await.unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
        assert!(pool.published().is_empty());
    }

    #[tokio::test]
    async fn test_follow_without_signer_is_refused() {
        let target = Keys::generate();
        let client = read_only_engine(Vec::new()).await;
        let err = client.follow(&target.public_key().to_hex()).await.unwrap_err();
        assert!(matches!(err, Error::SignerMissing));
    }
}
