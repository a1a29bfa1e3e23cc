//! Wallet facade
//!
//! The single entry point a host application talks to. Wires the core, the
//! signer manager and the sync layer together behind a small status machine
//! and converts typed internal errors into UI-friendly result shapes where
//! the host expects them.

use std::sync::Arc;

use nostr::PublicKey;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::WalletConfig;
use crate::mint::MintClient;
use crate::notify::{Notification, NotificationKind, NotificationSink};
use crate::relay::RelayTransport;
use crate::secure::SecureStore;
use crate::signer::{CredentialMethod, SignerAuthority, SignerManager};
use crate::sync::{ClaimOutcome, SyncMode, WalletSync};
use crate::wallet::{
    LocalStore, TransactionRecord, WalletCore, WalletError, WalletResult, WalletState,
};

/// Facade lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletStatus {
    Uninitialized,
    Initializing,
    /// Local-key session; every operation available
    Ready,
    /// Remote-signer session: raw-key paths are unavailable, async-signed
    /// operations (including sends) still work
    ReceiveOnly,
    /// Initialization failed; a later `initialize` may retry
    Failed,
}

/// UI result shape for fire-and-forget style operations
#[derive(Debug, Clone)]
pub struct SendNutzapResult {
    pub success: bool,
    /// Encoded token that left the wallet. Present whenever proofs were
    /// carved out, even when the event publish failed, so the host can hand
    /// the token to the recipient out-of-band instead of losing the funds.
    pub token: Option<String>,
    pub error: Option<String>,
}

impl SendNutzapResult {
    fn ok(token: String) -> Self {
        Self { success: true, token: Some(token), error: None }
    }

    fn err(message: String) -> Self {
        Self { success: false, token: None, error: Some(message) }
    }
}

/// The wallet as the host application sees it
pub struct Wallet {
    core: Arc<WalletCore>,
    sync: Arc<WalletSync>,
    signer_mgr: Arc<SignerManager>,
    notify: Arc<dyn NotificationSink>,
    status: RwLock<WalletStatus>,
    pubkey: RwLock<Option<PublicKey>>,
}

impl Wallet {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn LocalStore>,
        secure: Arc<dyn SecureStore>,
        mint: Arc<dyn MintClient>,
        relay: Arc<dyn RelayTransport>,
        authority: Option<Arc<dyn SignerAuthority>>,
        notify: Arc<dyn NotificationSink>,
        config: WalletConfig,
    ) -> Self {
        let signer_mgr = Arc::new(SignerManager::new(secure, Arc::clone(&store), authority, &config));
        let core = Arc::new(WalletCore::new(store, mint));
        let sync = Arc::new(WalletSync::new(
            relay,
            Arc::clone(&signer_mgr),
            Arc::clone(&core),
            Arc::clone(&notify),
            config,
        ));
        Self {
            core,
            sync,
            signer_mgr,
            notify,
            status: RwLock::new(WalletStatus::Uninitialized),
            pubkey: RwLock::new(None),
        }
    }

    pub async fn status(&self) -> WalletStatus {
        *self.status.read().await
    }

    /// Sync layer handle, mainly for hosts that want the task log
    pub fn sync(&self) -> &Arc<WalletSync> {
        &self.sync
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bring the wallet up for `pubkey`.
    ///
    /// Loads local state, falls back to a relay restore when none exists,
    /// resolves the signer and starts the claim loop. Idempotent once the
    /// wallet is up; a failure leaves the status at `Failed` and a later call
    /// retries from scratch.
    pub async fn initialize(&self, pubkey: PublicKey) -> WalletResult<WalletStatus> {
        {
            let status = *self.status.read().await;
            if matches!(status, WalletStatus::Ready | WalletStatus::ReceiveOnly) {
                return Ok(status);
            }
        }
        *self.status.write().await = WalletStatus::Initializing;

        match self.initialize_inner(pubkey).await {
            Ok(status) => {
                *self.status.write().await = status;
                *self.pubkey.write().await = Some(pubkey);
                info!(?status, "wallet initialized");
                Ok(status)
            }
            Err(e) => {
                *self.status.write().await = WalletStatus::Failed;
                warn!("wallet initialization failed: {}", e);
                Err(e)
            }
        }
    }

    async fn initialize_inner(&self, pubkey: PublicKey) -> WalletResult<WalletStatus> {
        let method = self
            .signer_mgr
            .resolve_active_method()
            .await
            .map_err(WalletError::Signer)?
            .ok_or(WalletError::Signer(crate::signer::SignerError::NoCredential))?;

        let local_state = self.core.initialize(pubkey).await?;
        let mode = self.sync.initialize(pubkey).await;

        if local_state.is_none() && mode == SyncMode::Full {
            if let Some(restored) = self.sync.restore_proofs_from_nostr(pubkey).await {
                self.core
                    .adopt_restored(&restored.mint_url, restored.proofs)
                    .await?;
            }
        }

        // Only after the restore has settled: the loop's first pass runs
        // immediately and must not race wallet state creation
        self.sync.start_claim_loop(pubkey);

        Ok(match (method, mode) {
            (_, SyncMode::ReceiveOnly) | (CredentialMethod::RemoteSigner, _) => WalletStatus::ReceiveOnly,
            (CredentialMethod::LocalKey, SyncMode::Full) => WalletStatus::Ready,
        })
    }

    /// Explicit wallet creation against a chosen mint
    pub async fn create_wallet(&self, mint_url: &str) -> WalletResult<WalletState> {
        self.ensure_up().await?;
        let state = self.core.create_wallet(mint_url).await?;
        self.sync.mirror_state().await;
        Ok(state)
    }

    /// Tear everything down: claim loop, relay session, local state, signer
    /// cache. Leaves the facade back at `Uninitialized`.
    pub async fn clear_wallet(&self) -> WalletResult<()> {
        self.sync.teardown().await;
        self.core.clear().await?;
        self.signer_mgr.clear_cache().await;
        *self.pubkey.write().await = None;
        *self.status.write().await = WalletStatus::Uninitialized;
        Ok(())
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Send `amount` sats to `recipient` as a nutzap.
    ///
    /// The core send is the commit point; once proofs are carved out, the
    /// event publish is best-effort and a publish failure is never rolled
    /// back (the token already left the wallet).
    pub async fn send_nutzap(
        &self,
        recipient: PublicKey,
        amount: u64,
        memo: Option<String>,
    ) -> SendNutzapResult {
        if let Err(e) = self.ensure_up().await {
            return SendNutzapResult::err(e.to_string());
        }

        let outcome = match self.core.send_token(amount, memo.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => return SendNutzapResult::err(e.to_string()),
        };

        let published = self
            .sync
            .publish_nutzap(recipient, outcome.amount, &outcome.token, memo.as_deref())
            .await;
        if !published {
            warn!(amount, "nutzap sent but event publish failed; funds are in the token");
        }
        self.sync.mirror_state().await;
        SendNutzapResult::ok(outcome.token)
    }

    /// One manual claim pass; the background loop does this continuously
    pub async fn claim_nutzaps(&self) -> WalletResult<ClaimOutcome> {
        let pubkey = self.ensure_up().await?;
        Ok(self.sync.claim_nutzaps(pubkey).await)
    }

    /// Spendable balance in sats; zero before initialization or wallet creation
    pub async fn get_balance(&self) -> u64 {
        self.core.balance().await
    }

    pub async fn get_transaction_history(&self) -> Vec<TransactionRecord> {
        self.core.history().await
    }

    pub async fn create_lightning_invoice(
        &self,
        amount: u64,
        memo: Option<&str>,
    ) -> WalletResult<crate::mint::MintQuote> {
        self.ensure_up().await?;
        self.core.create_lightning_invoice(amount, memo).await
    }

    /// Poll an invoice; on the unpaid-to-paid transition the minted funds
    /// are mirrored to relays and the host is notified
    pub async fn check_invoice_paid(&self, quote_id: &str) -> WalletResult<bool> {
        self.ensure_up().await?;

        let already_minted = self
            .core
            .snapshot()
            .await
            .map(|s| {
                s.pending_quotes
                    .iter()
                    .any(|q| q.quote_id == quote_id && q.minted)
            })
            .unwrap_or(false);

        let paid = self.core.check_invoice_paid(quote_id).await?;
        if paid && !already_minted {
            let amount = self
                .core
                .snapshot()
                .await
                .and_then(|s| {
                    s.pending_quotes
                        .iter()
                        .find(|q| q.quote_id == quote_id)
                        .map(|q| q.amount)
                })
                .unwrap_or(0);
            self.notify
                .notify(Notification {
                    kind: NotificationKind::InvoicePaid,
                    amount,
                    memo: None,
                })
                .await;
            self.sync.mirror_state().await;
        }
        Ok(paid)
    }

    pub async fn pay_lightning_invoice(&self, invoice: &str) -> WalletResult<u64> {
        self.ensure_up().await?;
        let amount = self.core.pay_lightning_invoice(invoice).await?;
        self.sync.mirror_state().await;
        Ok(amount)
    }

    // =========================================================================
    // Guards
    // =========================================================================

    async fn ensure_up(&self) -> WalletResult<PublicKey> {
        let status = *self.status.read().await;
        if !matches!(status, WalletStatus::Ready | WalletStatus::ReceiveOnly) {
            return Err(WalletError::NotInitialized);
        }
        (*self.pubkey.read().await).ok_or(WalletError::NotInitialized)
    }
}
