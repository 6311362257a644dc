//! The aggregation engine facade.
//!
//! [`NostrWykop`] is an explicitly constructed session context: relay pool
//! and signer are injected at build time and the instance is passed to every
//! call site, with a clear connect/shutdown lifecycle. There is no global
//! client state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::relay::{NostrPool, RelayPool};
use crate::signer::{EventSigner, KeysSigner};

/// Engine configuration: relay set, timeout and fetch-window sizes.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub relays: Vec<String>,
    /// Per-query relay timeout.
    pub query_timeout: Duration,
    /// Default feed page size.
    pub post_limit: usize,
    /// Fetch window for a single user's posts.
    pub user_post_limit: usize,
    /// Fetch window for replies under one parent.
    pub comment_limit: usize,
    /// Oversampled recent-event window scanned by search.
    pub search_window: usize,
    /// Fetch window for kind-3 events when deriving followers.
    pub follower_scan_limit: usize,
    /// Fetch window for sent/received direct messages.
    pub dm_window: usize,
    /// Comment trees deeper than this are cut off.
    pub max_comment_depth: usize,
    /// Hard cap on resolved comment nodes per post.
    pub max_comment_nodes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relays: vec![
                "wss://nos.lol".to_string(),
                "wss://relay.damus.io".to_string(),
            ],
            query_timeout: Duration::from_secs(15),
            post_limit: 20,
            user_post_limit: 50,
            comment_limit: 100,
            search_window: 500,
            follower_scan_limit: 1000,
            dm_window: 100,
            max_comment_depth: 8,
            max_comment_nodes: 500,
        }
    }
}

/// The event-to-domain aggregation engine.
///
/// Every read re-derives domain state from a fresh relay query; two
/// consecutive reads may disagree whenever relay state moved between them.
pub struct NostrWykop {
    pub(crate) pool: Arc<dyn RelayPool>,
    pub(crate) signer: Option<Arc<dyn EventSigner>>,
    pub(crate) config: ClientConfig,
    /// Serializes follow/unfollow read-modify-republish cycles so two
    /// concurrent mutations of our own kind-3 list cannot overwrite each
    /// other within this session.
    pub(crate) follow_lock: tokio::sync::Mutex<()>,
    connected: AtomicBool,
}

impl NostrWykop {
    /// Build an engine over an injected pool and optional signer.
    pub fn new(
        pool: Arc<dyn RelayPool>,
        signer: Option<Arc<dyn EventSigner>>,
        config: ClientConfig,
    ) -> Self {
        Self {
            pool,
            signer,
            config,
            follow_lock: tokio::sync::Mutex::new(()),
            connected: AtomicBool::new(false),
        }
    }

    /// Convenience constructor: production relay pool from the config, plus
    /// an optional local key pair for the write paths.
    pub fn with_config(config: ClientConfig, keys: Option<nostr_sdk::Keys>) -> Self {
        let pool = Arc::new(NostrPool::new(config.relays.clone(), config.query_timeout));
        let signer = keys.map(|k| Arc::new(KeysSigner::new(k)) as Arc<dyn EventSigner>);
        Self::new(pool, signer, config)
    }

    /// Connect the relay pool. Until this succeeds every operation fails
    /// with [`Error::Connectivity`].
    pub async fn connect(&self) -> Result<()> {
        self.pool.connect().await?;
        self.connected.store(true, Ordering::SeqCst);
        log::info!("connected to relay pool");
        Ok(())
    }

    /// Tear down relay connections.
    pub async fn shutdown(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.pool.shutdown().await;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Connectivity)
        }
    }

    /// Write-path precondition: a signer must be attached.
    pub(crate) fn require_signer(&self) -> Result<&Arc<dyn EventSigner>> {
        self.signer.as_ref().ok_or(Error::SignerMissing)
    }
}
