//! Direct message codec.
//!
//! Kind-4 events carry NIP-04 ciphertext; both directions of a thread are
//! decrypted against the counterparty's key. A message that fails to
//! decrypt degrades to a visible placeholder instead of poisoning the
//! whole thread.

use std::collections::HashMap;

use futures_util::future::{try_join, try_join_all};
use nostr_sdk::prelude::*;

use crate::client::NostrWykop;
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::util::parse_pubkey;

/// Shown in place of ciphertext that could not be decrypted.
pub const DECRYPT_FAILED_PLACEHOLDER: &str = "[message could not be decrypted]";

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
pub struct DirectMessage {
    pub id: String,
    /// Plaintext after decryption (or the failure placeholder).
    pub content: String,
    pub sender: String,
    pub receiver: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Locally inferred: our own messages are trivially read. There is no
    /// durable read ledger, so this is re-derived on every call.
    pub read: bool,
}

#[derive(serde::Serialize, Clone, Debug)]
pub struct Conversation {
    pub pubkey: String,
    pub profile: Profile,
    pub last_message: String,
    pub last_message_at: u64,
    /// Heuristic: every fetched message from the counterparty counts.
    /// Repeated calls can disagree; see the read-ledger design note.
    pub unread_count: u64,
}

impl NostrWykop {
    /// Encrypt, sign and publish a direct message, returning the plaintext
    /// domain object for immediate display.
    pub async fn send_message(&self, recipient: &str, plaintext: &str) -> Result<DirectMessage> {
        self.ensure_connected()?;
        let signer = self.require_signer()?.clone();
        let recipient_pk = parse_pubkey(recipient)
            .ok_or_else(|| Error::InvalidKey(recipient.to_string()))?;

        let ciphertext = signer.nip04_encrypt(&recipient_pk, plaintext).await?;
        let event = signer
            .sign(
                EventBuilder::new(Kind::EncryptedDirectMessage, ciphertext)
                    .tag(Tag::public_key(recipient_pk)),
            )
            .await?;
        self.pool.publish(&event).await?;

        Ok(DirectMessage {
            id: event.id.to_hex(),
            content: plaintext.to_string(),
            sender: event.pubkey.to_hex(),
            receiver: Some(recipient_pk.to_hex()),
            created_at: event.created_at.as_u64() * 1000,
            read: true,
        })
    }

    /// The full two-way thread with one counterparty, oldest first.
    pub async fn get_conversation(&self, counterparty: &str) -> Result<Vec<DirectMessage>> {
        self.ensure_connected()?;
        let signer = self.require_signer()?.clone();
        let other = match parse_pubkey(counterparty) {
            Some(pk) => pk,
            None => return Ok(Vec::new()),
        };
        let me = signer.public_key().await?;

        let sent = Filter::new()
            .kind(Kind::EncryptedDirectMessage)
            .author(me)
            .pubkey(other);
        let received = Filter::new()
            .kind(Kind::EncryptedDirectMessage)
            .author(other)
            .pubkey(me);
        let (sent, received) = try_join(self.pool.query(sent), self.pool.query(received)).await?;

        let mut events: Vec<Event> = sent.into_iter().chain(received).collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut thread = Vec::with_capacity(events.len());
        for event in &events {
            // Decrypt against the counterparty's key for both directions
            let content = self.decrypt_or_placeholder(&signer, &other, event).await;
            thread.push(DirectMessage {
                id: event.id.to_hex(),
                content,
                sender: event.pubkey.to_hex(),
                receiver: recipient_of(event),
                created_at: event.created_at.as_u64() * 1000,
                read: event.pubkey == me,
            });
        }
        Ok(thread)
    }

    /// One entry per counterparty, holding only the most recent message,
    /// ordered by recency.
    pub async fn get_conversations(&self) -> Result<Vec<Conversation>> {
        self.ensure_connected()?;
        let signer = self.require_signer()?.clone();
        let me = signer.public_key().await?;

        let sent = Filter::new()
            .kind(Kind::EncryptedDirectMessage)
            .author(me)
            .limit(self.config.dm_window);
        let received = Filter::new()
            .kind(Kind::EncryptedDirectMessage)
            .pubkey(me)
            .limit(self.config.dm_window);
        let (sent, received) = try_join(self.pool.query(sent), self.pool.query(received)).await?;

        // Reduce to the latest message (and an unread tally) per counterparty
        struct Entry {
            last_content: String,
            last_at: u64,
            unread: u64,
        }
        let mut by_counterparty: HashMap<String, Entry> = HashMap::new();

        for event in sent.iter().chain(received.iter()) {
            let other_pk = if event.pubkey == me {
                match recipient_of(event).and_then(|hex| parse_pubkey(&hex)) {
                    Some(pk) => pk,
                    None => continue,
                }
            } else {
                event.pubkey
            };
            if other_pk == me {
                // Self-DMs don't form a conversation
                continue;
            }

            let content = self.decrypt_or_placeholder(&signer, &other_pk, event).await;
            let at = event.created_at.as_u64() * 1000;
            let incoming = event.pubkey != me;

            let entry = by_counterparty
                .entry(other_pk.to_hex())
                .or_insert_with(|| Entry {
                    last_content: content.clone(),
                    last_at: at,
                    unread: 0,
                });
            if at >= entry.last_at {
                entry.last_at = at;
                entry.last_content = content;
            }
            if incoming {
                entry.unread += 1;
            }
        }

        let mut conversations = try_join_all(by_counterparty.into_iter().map(
            |(pubkey, entry)| async move {
                let profile = self.get_profile(&pubkey).await?;
                Ok::<_, Error>(Conversation {
                    pubkey,
                    profile,
                    last_message: entry.last_content,
                    last_message_at: entry.last_at,
                    unread_count: entry.unread,
                })
            },
        ))
        .await?;

        conversations.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(conversations)
    }

    /// Publish an advisory kind-5 deletion for one of our messages. Relays
    /// and other clients may or may not honor it; the ciphertext is not
    /// guaranteed unrecoverable.
    pub async fn delete_message(&self, message_id: &str) -> Result<()> {
        self.ensure_connected()?;
        let signer = self.require_signer()?.clone();
        let event_id = EventId::from_hex(message_id)
            .map_err(|_| Error::InvalidId(message_id.to_string()))?;

        let event = signer
            .sign(EventBuilder::new(Kind::EventDeletion, "").tag(Tag::event(event_id)))
            .await?;
        self.pool.publish(&event).await
    }

    async fn decrypt_or_placeholder(
        &self,
        signer: &std::sync::Arc<dyn crate::signer::EventSigner>,
        counterparty: &PublicKey,
        event: &Event,
    ) -> String {
        match signer.nip04_decrypt(counterparty, &event.content).await {
            Ok(plaintext) => plaintext,
            Err(e) => {
                log::warn!("failed to decrypt message {}: {}", event.id, e);
                DECRYPT_FAILED_PLACEHOLDER.to_string()
            }
        }
    }
}

/// The recipient ("p" tag) of a direct message event, if present.
fn recipient_of(event: &Event) -> Option<String> {
    event.tags.iter().find_map(|tag| {
        let values = tag.as_slice();
        if values.len() >= 2 && values[0] == "p" {
            Some(values[1].clone())
        } else {
            None
        }
    })
}
