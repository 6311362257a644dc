//! Signer seam.
//!
//! Read paths never need a signer; every write path (post, comment, vote,
//! follow, message) refuses to run without one. NIP-04 encryption lives
//! here too, since it is keyed by the same secret.

use async_trait::async_trait;
use nostr_sdk::nips::nip04;
use nostr_sdk::prelude::*;

use crate::error::{Error, Result};

/// Signing and NIP-04 encryption capability.
#[async_trait]
pub trait EventSigner: Send + Sync {
    async fn public_key(&self) -> Result<PublicKey>;

    /// Finalize a draft: fills in id, pubkey and signature.
    async fn sign(&self, builder: EventBuilder) -> Result<Event>;

    async fn nip04_encrypt(&self, counterparty: &PublicKey, plaintext: &str) -> Result<String>;

    async fn nip04_decrypt(&self, counterparty: &PublicKey, ciphertext: &str) -> Result<String>;
}

/// Local in-process signer wrapping a `nostr_sdk::Keys` pair.
pub struct KeysSigner {
    keys: Keys,
}

impl KeysSigner {
    pub fn new(keys: Keys) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl EventSigner for KeysSigner {
    async fn public_key(&self) -> Result<PublicKey> {
        Ok(self.keys.public_key())
    }

    async fn sign(&self, builder: EventBuilder) -> Result<Event> {
        builder
            .sign_with_keys(&self.keys)
            .map_err(|e| Error::Signer(e.to_string()))
    }

    async fn nip04_encrypt(&self, counterparty: &PublicKey, plaintext: &str) -> Result<String> {
        nip04::encrypt(self.keys.secret_key(), counterparty, plaintext)
            .map_err(|e| Error::Signer(e.to_string()))
    }

    async fn nip04_decrypt(&self, counterparty: &PublicKey, ciphertext: &str) -> Result<String> {
        nip04::decrypt(self.keys.secret_key(), counterparty, ciphertext)
            .map_err(|e| Error::Signer(e.to_string()))
    }
}
