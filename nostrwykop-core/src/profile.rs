//! Profile resolution.
//!
//! A profile is recomputed from the newest kind-0 metadata event on every
//! fetch. Older metadata events are discarded whole: latest-timestamp-wins,
//! with no field-level merge across revisions.

use nostr_sdk::prelude::*;

use crate::client::NostrWykop;
use crate::error::Result;
use crate::util::parse_pubkey;

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
pub struct Profile {
    /// Canonical hex form where the key could be decoded; the caller's raw
    /// input otherwise.
    pub pubkey: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub about: Option<String>,
    pub nip05: Option<String>,
}

impl Profile {
    /// Default "empty" profile, synthesized whenever no usable metadata
    /// exists so that lookups stay total for the UI.
    pub fn empty(pubkey: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            name: None,
            avatar: None,
            about: None,
            nip05: None,
        }
    }

    /// Build a profile from decoded kind-0 metadata.
    pub fn from_metadata(pubkey: impl Into<String>, meta: Metadata) -> Self {
        Self {
            pubkey: pubkey.into(),
            name: meta.name.or(meta.display_name),
            avatar: meta.picture,
            about: meta.about,
            nip05: meta.nip05,
        }
    }
}

/// A partial profile edit: `None` keeps the current value, `Some` replaces
/// it.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub about: Option<String>,
    pub nip05: Option<String>,
}

impl NostrWykop {
    /// Resolve the canonical profile snapshot for a pubkey (hex or npub).
    ///
    /// Never fails on bad data: an unknown key, unparseable metadata or a
    /// malformed npub all degrade to the empty profile. Only a relay fault
    /// propagates.
    pub async fn get_profile(&self, pubkey: &str) -> Result<Profile> {
        self.ensure_connected()?;

        let pk = match parse_pubkey(pubkey) {
            Some(pk) => pk,
            None => {
                // Malformed key: soft-fail with the raw input as identity
                log::warn!("profile lookup with undecodable pubkey: {}", pubkey);
                return Ok(Profile::empty(pubkey));
            }
        };
        let hex = pk.to_hex();

        let filter = Filter::new().author(pk).kind(Kind::Metadata);
        let mut events = self.pool.query(filter).await?;

        // Latest metadata event wins outright
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let newest = match events.first() {
            Some(event) => event,
            None => return Ok(Profile::empty(hex)),
        };

        match Metadata::from_json(&newest.content) {
            Ok(meta) => Ok(Profile::from_metadata(hex, meta)),
            Err(e) => {
                log::warn!("unparseable profile metadata for {}: {}", hex, e);
                Ok(Profile::empty(hex))
            }
        }
    }

    /// Publish a kind-0 metadata revision for the attached signer.
    ///
    /// Kind 0 is replaceable, so the edit is merged over the current
    /// profile first and the whole record republished; untouched fields
    /// survive the replacement. Returns the resulting profile
    /// optimistically.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile> {
        self.ensure_connected()?;
        let signer = self.require_signer()?.clone();
        let me = signer.public_key().await?.to_hex();
        let current = self.get_profile(&me).await?;

        let name = update.name.clone().or(current.name);
        let about = update.about.clone().or(current.about);
        let nip05 = update.nip05.clone().or(current.nip05);

        let mut meta = Metadata::new();
        if let Some(name) = &name {
            meta = meta.name(name);
        }
        let avatar = match update.avatar.clone().or(current.avatar) {
            Some(url) => match Url::parse(&url) {
                Ok(parsed) => {
                    meta = meta.picture(parsed);
                    Some(url)
                }
                Err(e) => {
                    log::warn!("dropping unparseable avatar url {}: {}", url, e);
                    None
                }
            },
            None => None,
        };
        if let Some(about) = &about {
            meta = meta.about(about);
        }
        if let Some(nip05) = &nip05 {
            meta = meta.nip05(nip05);
        }

        let event = signer.sign(EventBuilder::metadata(&meta)).await?;
        self.pool.publish(&event).await?;

        Ok(Profile {
            pubkey: me,
            name,
            avatar,
            about,
            nip05,
        })
    }
}
