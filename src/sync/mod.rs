//! Relay synchronization layer
//!
//! Mirrors the wallet core outward: plaintext wallet metadata and encrypted
//! proof backups go to relays as replaceable events, incoming nutzaps come
//! back in through the claim loop, and a new device reconstructs its state
//! from whatever backups the relays still hold.
//!
//! Everything here is best-effort. The local wallet is authoritative; a dead
//! relay or an unresolvable signer degrades sync, never the wallet itself.

pub mod claim;
pub mod events;
pub mod restore;
pub mod tasks;

use std::sync::Arc;

use nostr::PublicKey;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::notify::NotificationSink;
use crate::relay::RelayTransport;
use crate::signer::{SignerHandle, SignerManager};
use crate::wallet::WalletCore;

use events::{build_token_backup, build_wallet_info, TokenBackupPayload};
use tasks::{TaskLog, TaskStatus};

pub use claim::ClaimOutcome;
pub use restore::RestoredWallet;

/// How much of sync is actually running after initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Signer resolved: publish, restore and claim all work
    Full,
    /// No signer within the resolution window: claims still run, but nothing
    /// is published or restored until a signer appears
    ReceiveOnly,
}

/// Orchestrates relay-facing work around the wallet core
pub struct WalletSync {
    relay: Arc<dyn RelayTransport>,
    signer_mgr: Arc<SignerManager>,
    core: Arc<WalletCore>,
    notify: Arc<dyn NotificationSink>,
    config: WalletConfig,
    tasks: TaskLog,
    // Resolved once at initialize; None means receive-only until re-init
    signer: RwLock<Option<SignerHandle>>,
    shutdown_tx: watch::Sender<bool>,
    claim_handle: Mutex<Option<JoinHandle<()>>>,
}

impl WalletSync {
    pub fn new(
        relay: Arc<dyn RelayTransport>,
        signer_mgr: Arc<SignerManager>,
        core: Arc<WalletCore>,
        notify: Arc<dyn NotificationSink>,
        config: WalletConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            relay,
            signer_mgr,
            core,
            notify,
            tasks: TaskLog::new(config.task_log_capacity),
            config,
            signer: RwLock::new(None),
            shutdown_tx,
            claim_handle: Mutex::new(None),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Resolve the signer and connect relays. Never fails: an unresolvable
    /// signer means receive-only mode, a dead relay means publishes defer
    /// until it heals.
    ///
    /// Does not start the claim loop; the caller starts it with
    /// [`WalletSync::start_claim_loop`] once any restore has settled, so a
    /// claimed nutzap cannot create wallet state while a relay backup is
    /// still being adopted.
    pub async fn initialize(&self, pubkey: PublicKey) -> SyncMode {
        let mode = match tokio::time::timeout(
            self.config.signer_resolve_timeout,
            self.signer_mgr.signer(),
        )
        .await
        {
            Ok(Ok(handle)) => {
                *self.signer.write().await = Some(handle);
                SyncMode::Full
            }
            Ok(Err(e)) => {
                warn!("signer unavailable, sync is receive-only: {}", e);
                self.tasks
                    .record("resolve_signer", TaskStatus::Deferred, Some(e.to_string()));
                SyncMode::ReceiveOnly
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.signer_resolve_timeout.as_secs(),
                    "signer resolution timed out, sync is receive-only"
                );
                self.tasks
                    .record("resolve_signer", TaskStatus::Deferred, Some("timed out".into()));
                SyncMode::ReceiveOnly
            }
        };

        if let Err(e) = self.relay.connect().await {
            // Publishes will defer; the claim loop retries on its own schedule
            warn!("relay connect failed at startup: {}", e);
        }

        info!(?mode, "sync initialized");
        mode
    }

    /// Stop the claim loop and drop the resolved signer
    pub async fn teardown(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.claim_handle.lock().await.take() {
            handle.abort();
        }
        *self.signer.write().await = None;
        self.relay.disconnect().await;
        info!("sync torn down");
    }

    /// The signer resolved at initialization, if any
    pub(crate) async fn signer_if_available(&self) -> Option<SignerHandle> {
        self.signer.read().await.clone()
    }

    /// Recent background task outcomes, oldest first
    pub fn task_outcomes(&self) -> Vec<tasks::TaskOutcome> {
        self.tasks.recent()
    }

    // =========================================================================
    // Publish paths
    // =========================================================================

    /// Publish the replaceable plaintext wallet metadata event.
    ///
    /// Returns whether the publish happened; a missing signer or dead relay
    /// is logged and deferred, never an error.
    pub async fn publish_wallet_info(&self) -> bool {
        let Some(signer) = self.signer_if_available().await else {
            self.tasks
                .record("publish_wallet_info", TaskStatus::Deferred, Some("no signer".into()));
            return false;
        };
        let Some(state) = self.core.snapshot().await else {
            debug!("no wallet state, nothing to publish");
            return false;
        };

        let builder = build_wallet_info("wallet", state.balance(), &state.mint_url);
        let event = match signer.sign_builder(builder).await {
            Ok(event) => event,
            Err(e) => {
                self.tasks
                    .record("publish_wallet_info", TaskStatus::Failed, Some(e.to_string()));
                return false;
            }
        };

        match self.relay.publish(event).await {
            Ok(()) => {
                self.tasks.record("publish_wallet_info", TaskStatus::Success, None);
                true
            }
            Err(e) => {
                let status = if e.is_disconnected() { TaskStatus::Deferred } else { TaskStatus::Failed };
                self.tasks.record("publish_wallet_info", status, Some(e.to_string()));
                false
            }
        }
    }

    /// Publish the encrypted proof backup for the wallet's mint.
    ///
    /// The event is replaceable per (pubkey, mint identifier): relays keep
    /// only the newest record, so a successful publish supersedes the last.
    pub async fn publish_token_event(&self) -> bool {
        let Some(signer) = self.signer_if_available().await else {
            self.tasks
                .record("publish_token_event", TaskStatus::Deferred, Some("no signer".into()));
            return false;
        };
        let Some(state) = self.core.snapshot().await else {
            debug!("no wallet state, nothing to back up");
            return false;
        };

        let payload = TokenBackupPayload::new(&state.mint_url, state.proofs.clone());
        let plaintext = match serde_json::to_string(&payload) {
            Ok(json) => json,
            Err(e) => {
                self.tasks
                    .record("publish_token_event", TaskStatus::Failed, Some(e.to_string()));
                return false;
            }
        };

        let encrypted = match signer.nip44_self_encrypt(&plaintext).await {
            Ok(ciphertext) => ciphertext,
            Err(e) => {
                self.tasks
                    .record("publish_token_event", TaskStatus::Failed, Some(e.to_string()));
                return false;
            }
        };

        let builder = build_token_backup(encrypted, &state.mint_url);
        let event = match signer.sign_builder(builder).await {
            Ok(event) => event,
            Err(e) => {
                self.tasks
                    .record("publish_token_event", TaskStatus::Failed, Some(e.to_string()));
                return false;
            }
        };

        match self.relay.publish(event).await {
            Ok(()) => {
                debug!(balance = payload.balance(), "proof backup published");
                self.tasks.record("publish_token_event", TaskStatus::Success, None);
                true
            }
            Err(e) => {
                let status = if e.is_disconnected() { TaskStatus::Deferred } else { TaskStatus::Failed };
                self.tasks.record("publish_token_event", status, Some(e.to_string()));
                false
            }
        }
    }

    /// Publish a nutzap event carrying an already-carved token.
    ///
    /// Returns whether the event reached the relay layer. The token is
    /// embedded in the event content; losing the publish loses the payment
    /// notification, not the funds.
    pub async fn publish_nutzap(
        &self,
        recipient: PublicKey,
        amount: u64,
        token: &str,
        memo: Option<&str>,
    ) -> bool {
        let Some(signer) = self.signer_if_available().await else {
            self.tasks
                .record("publish_nutzap", TaskStatus::Deferred, Some("no signer".into()));
            return false;
        };
        let Some(state) = self.core.snapshot().await else {
            return false;
        };

        let builder = events::build_nutzap(recipient, amount, &state.mint_url, token, memo);
        let event = match signer.sign_builder(builder).await {
            Ok(event) => event,
            Err(e) => {
                self.tasks
                    .record("publish_nutzap", TaskStatus::Failed, Some(e.to_string()));
                return false;
            }
        };

        match self.relay.publish(event).await {
            Ok(()) => {
                self.tasks.record("publish_nutzap", TaskStatus::Success, None);
                true
            }
            Err(e) => {
                let status = if e.is_disconnected() { TaskStatus::Deferred } else { TaskStatus::Failed };
                self.tasks.record("publish_nutzap", status, Some(e.to_string()));
                false
            }
        }
    }

    /// Mirror current state to relays: backup first, then the public info
    /// event. Best-effort; local state is already durable by the time this
    /// runs.
    pub async fn mirror_state(&self) {
        self.publish_token_event().await;
        self.publish_wallet_info().await;
    }
}
