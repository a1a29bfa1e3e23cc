//! Wallet core
//!
//! Owns the authoritative local proof set and mediates every mint
//! interaction. All mutations run under a single async mutex so concurrent
//! operations cannot double-spend the same proof, and every mutation either
//! commits the full replacement state or leaves the previous state untouched.
//!
//! The core never talks to relays; the sync layer reads snapshots from here
//! and writes back only through the receive path.

use std::sync::Arc;

use nostr::{PublicKey, Timestamp};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::mint::MintClient;

use super::errors::{WalletError, WalletResult};
use super::proofs::{merge_proofs, remove_proofs, select_proofs, Selection};
use super::store::LocalStore;
use super::token::Token;
use super::types::{
    PendingQuote, Proof, QuoteState, TransactionDirection, TransactionKind, TransactionRecord, WalletState,
    normalize_mint_url,
};

/// Result of a successful send: the redeemable token plus what remains
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub token: String,
    pub amount: u64,
    pub remaining_balance: u64,
}

fn unix_now() -> u64 {
    Timestamp::now().as_secs()
}

/// The active wallet session: which pubkey we serve and its state, if any
#[derive(Default)]
struct Session {
    pubkey: Option<PublicKey>,
    state: Option<WalletState>,
}

/// Authoritative local wallet state and mint operations
pub struct WalletCore {
    store: Arc<dyn LocalStore>,
    mint: Arc<dyn MintClient>,
    // Single writer: all state reads-for-write and mutations serialize here
    session: Mutex<Session>,
}

impl WalletCore {
    pub fn new(store: Arc<dyn LocalStore>, mint: Arc<dyn MintClient>) -> Self {
        Self {
            store,
            mint,
            session: Mutex::new(Session::default()),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load persisted state for `pubkey`. Returns `None` when no wallet
    /// exists locally; the caller decides whether to try a relay restore.
    /// Never creates a wallet. Idempotent for the same pubkey.
    pub async fn initialize(&self, pubkey: PublicKey) -> WalletResult<Option<WalletState>> {
        let mut session = self.session.lock().await;

        if session.pubkey == Some(pubkey) {
            if let Some(state) = &session.state {
                return Ok(Some(state.clone()));
            }
        }

        let state = self.store.load_wallet(&pubkey).await?;
        match &state {
            Some(s) => info!(balance = s.balance(), mint = %s.mint_url, "wallet state loaded"),
            None => debug!("no local wallet state for pubkey"),
        }
        session.pubkey = Some(pubkey);
        session.state = state.clone();
        Ok(state)
    }

    /// Explicit, UI-triggered wallet creation
    pub async fn create_wallet(&self, mint_url: &str) -> WalletResult<WalletState> {
        let mut session = self.session.lock().await;
        let pubkey = session.pubkey.ok_or(WalletError::NotInitialized)?;
        if session.state.is_some() {
            return Err(WalletError::AlreadyExists);
        }

        let state = WalletState::new(mint_url, unix_now());
        self.store.save_wallet(&pubkey, &state).await?;
        session.state = Some(state.clone());
        info!(mint = %state.mint_url, "wallet created");
        Ok(state)
    }

    /// Adopt proofs recovered from relay backups (new-device bootstrap).
    /// Only meaningful when no local state exists; proofs are deduplicated
    /// by secret before adoption.
    pub async fn adopt_restored(&self, mint_url: &str, proofs: Vec<Proof>) -> WalletResult<WalletState> {
        let mut session = self.session.lock().await;
        let pubkey = session.pubkey.ok_or(WalletError::NotInitialized)?;
        if session.state.is_some() {
            return Err(WalletError::AlreadyExists);
        }

        let mut state = WalletState::new(mint_url, unix_now());
        let (merged, restored) = merge_proofs(&[], proofs);
        state.proofs = merged;
        self.store.save_wallet(&pubkey, &state).await?;
        info!(restored, mint = %state.mint_url, "wallet restored from relay backups");
        session.state = Some(state.clone());
        Ok(state)
    }

    /// Spendable balance; zero when no wallet exists yet
    pub async fn balance(&self) -> u64 {
        self.session
            .lock()
            .await
            .state
            .as_ref()
            .map(|s| s.balance())
            .unwrap_or(0)
    }

    /// Snapshot of the current state for read-only consumers (sync publish)
    pub async fn snapshot(&self) -> Option<WalletState> {
        self.session.lock().await.state.clone()
    }

    pub async fn history(&self) -> Vec<TransactionRecord> {
        self.session
            .lock()
            .await
            .state
            .as_ref()
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// Clear all local wallet state for the active pubkey
    pub async fn clear(&self) -> WalletResult<()> {
        let mut session = self.session.lock().await;
        if let Some(pubkey) = session.pubkey {
            self.store.clear_wallet(&pubkey).await?;
        }
        session.pubkey = None;
        session.state = None;
        info!("wallet state cleared");
        Ok(())
    }

    // =========================================================================
    // Ecash send / receive
    // =========================================================================

    /// Carve `amount` sats out of the local proof set and return a
    /// redeemable token.
    ///
    /// Exact-match selection avoids the mint entirely; otherwise the selected
    /// inputs are swapped at the mint for a payment proof plus change. The
    /// local state is replaced atomically: a failure at any point leaves the
    /// proof set byte-for-byte unchanged.
    pub async fn send_token(&self, amount: u64, memo: Option<String>) -> WalletResult<SendOutcome> {
        if amount == 0 {
            return Err(WalletError::ZeroAmount);
        }

        let mut session = self.session.lock().await;
        let pubkey = session.pubkey.ok_or(WalletError::NotInitialized)?;
        let state = session.state.as_ref().ok_or(WalletError::NoWallet)?;

        let available = state.balance();
        if available < amount {
            return Err(WalletError::InsufficientBalance { available, required: amount });
        }

        let selection = select_proofs(&state.proofs, amount)
            .ok_or(WalletError::InsufficientBalance { available, required: amount })?;

        let (consumed, send_proofs, change) = match selection {
            Selection::Exact(picked) => {
                debug!(amount, proofs = picked.len(), "exact-match send, no mint round trip");
                (picked.clone(), picked, Vec::new())
            }
            Selection::NeedsSwap { inputs, amount } => {
                debug!(amount, inputs = inputs.len(), "send requires mint swap for change");
                let outcome = self.mint.swap(&state.mint_url, inputs.clone(), amount).await?;
                (inputs, outcome.send, outcome.change)
            }
        };

        let token = Token::new(&state.mint_url, send_proofs, memo.clone());
        let encoded = token.encode()?;

        let mut next = state.clone();
        next.proofs = remove_proofs(&next.proofs, &consumed);
        let (merged, _) = merge_proofs(&next.proofs, change);
        next.proofs = merged;
        next.updated_at = unix_now();
        next.history.push(TransactionRecord {
            direction: TransactionDirection::Out,
            kind: TransactionKind::Send,
            amount,
            memo,
            created_at: next.updated_at,
        });

        // Persist first; only a durable state replaces the in-memory one
        self.store.save_wallet(&pubkey, &next).await?;
        let remaining_balance = next.balance();
        session.state = Some(next);

        info!(amount, remaining_balance, "token sent");
        Ok(SendOutcome {
            token: encoded,
            amount,
            remaining_balance,
        })
    }

    /// Redeem an encoded token into the wallet. Already-spent tokens are a
    /// soft failure: logged, zero credited, no error.
    pub async fn receive_token(&self, raw_token: &str, kind: TransactionKind) -> WalletResult<u64> {
        let token = Token::decode(raw_token)?;
        self.receive_decoded(token, kind).await
    }

    /// Redeem an already-decoded token. Used directly by the claim loop so a
    /// malformed event fails during parsing, before any state is touched.
    pub async fn receive_decoded(&self, token: Token, kind: TransactionKind) -> WalletResult<u64> {
        let token_amount = token.amount();
        if token_amount == 0 {
            debug!("zero-amount token skipped");
            return Ok(0);
        }
        let token_mint = normalize_mint_url(token.mint_url().unwrap_or_default());
        if token_mint.is_empty() {
            return Err(WalletError::InvalidToken {
                reason: "token carries no mint URL".to_string(),
            });
        }

        let mut session = self.session.lock().await;
        let pubkey = session.pubkey.ok_or(WalletError::NotInitialized)?;

        // First incoming funds bootstrap the wallet state around the token's mint
        let state = match &session.state {
            Some(state) => {
                if state.mint_url != token_mint {
                    return Err(WalletError::MintMismatch {
                        token_mint,
                        wallet_mint: state.mint_url.clone(),
                    });
                }
                state.clone()
            }
            None => {
                info!(mint = %token_mint, "creating wallet state on first receive");
                WalletState::new(token_mint.clone(), unix_now())
            }
        };

        let fresh = match self.mint.redeem(&state.mint_url, &token).await {
            Ok(proofs) => proofs,
            Err(err) if err.is_token_spent() => {
                warn!("token already spent at mint; crediting nothing");
                return Ok(0);
            }
            Err(err) => return Err(err.into()),
        };

        let (merged, credited) = merge_proofs(&state.proofs, fresh);
        if credited == 0 {
            debug!("redeemed proofs were all duplicates; nothing credited");
            return Ok(0);
        }

        let mut next = state;
        next.proofs = merged;
        next.updated_at = unix_now();
        next.history.push(TransactionRecord {
            direction: TransactionDirection::In,
            kind,
            amount: credited,
            memo: token.memo.clone(),
            created_at: next.updated_at,
        });

        self.store.save_wallet(&pubkey, &next).await?;
        session.state = Some(next);

        info!(credited, "token received");
        Ok(credited)
    }

    /// Redeem a nutzap exactly once per event id.
    ///
    /// Returns the credited amount; zero when the event was already claimed
    /// or its token was spent elsewhere. The claimed marker persists even for
    /// spent tokens so the claim loop stops re-attempting them. A token
    /// pending at the mint surfaces as an error instead: no marker is
    /// written, and a later pass retries it once the lock clears.
    pub async fn redeem_nutzap(&self, event_id: &str, token: Token) -> WalletResult<u64> {
        {
            let session = self.session.lock().await;
            if let Some(state) = &session.state {
                if state.has_claimed(event_id) {
                    debug!(event_id, "nutzap already claimed, skipping");
                    return Ok(0);
                }
            }
        }

        let credited = self.receive_decoded(token, TransactionKind::NutzapClaim).await?;

        let mut session = self.session.lock().await;
        if let (Some(pubkey), Some(state)) = (session.pubkey, session.state.as_mut()) {
            if !state.has_claimed(event_id) {
                state.claimed_event_ids.push(event_id.to_string());
                let snapshot = state.clone();
                if let Err(e) = self.store.save_wallet(&pubkey, &snapshot).await {
                    warn!("failed to persist claim marker: {}", e);
                }
            }
        }
        Ok(credited)
    }

    // =========================================================================
    // Lightning
    // =========================================================================

    /// Request a lightning invoice that funds the wallet once paid
    pub async fn create_lightning_invoice(
        &self,
        amount: u64,
        memo: Option<&str>,
    ) -> WalletResult<crate::mint::MintQuote> {
        if amount == 0 {
            return Err(WalletError::ZeroAmount);
        }

        let mut session = self.session.lock().await;
        let pubkey = session.pubkey.ok_or(WalletError::NotInitialized)?;
        let state = session.state.as_ref().ok_or(WalletError::NoWallet)?;

        let quote = self.mint.create_mint_quote(&state.mint_url, amount, memo).await?;

        let mut next = state.clone();
        next.pending_quotes.push(PendingQuote {
            quote_id: quote.quote_id.clone(),
            amount,
            payment_request: quote.payment_request.clone(),
            minted: false,
            created_at: unix_now(),
        });
        next.updated_at = unix_now();
        self.store.save_wallet(&pubkey, &next).await?;
        session.state = Some(next);

        info!(amount, quote_id = %quote.quote_id, "lightning invoice created");
        Ok(quote)
    }

    /// Poll a quote; a paid quote is minted into proofs exactly once
    pub async fn check_invoice_paid(&self, quote_id: &str) -> WalletResult<bool> {
        let mut session = self.session.lock().await;
        let pubkey = session.pubkey.ok_or(WalletError::NotInitialized)?;
        let state = session.state.as_ref().ok_or(WalletError::NoWallet)?;

        let pending = state
            .pending_quotes
            .iter()
            .find(|q| q.quote_id == quote_id)
            .cloned()
            .ok_or_else(|| WalletError::QuoteNotFound {
                quote_id: quote_id.to_string(),
            })?;

        if pending.minted {
            return Ok(true);
        }

        match self.mint.check_mint_quote(&state.mint_url, quote_id).await? {
            QuoteState::Paid | QuoteState::Issued => {}
            QuoteState::Unpaid => return Ok(false),
            QuoteState::Expired => {
                debug!(quote_id, "quote expired; dropping");
                let mut next = state.clone();
                next.pending_quotes.retain(|q| q.quote_id != quote_id);
                self.store.save_wallet(&pubkey, &next).await?;
                session.state = Some(next);
                return Ok(false);
            }
        }

        let fresh = self.mint.mint_proofs(&state.mint_url, quote_id, pending.amount).await?;
        let (merged, credited) = merge_proofs(&state.proofs, fresh);

        let mut next = state.clone();
        next.proofs = merged;
        next.updated_at = unix_now();
        for quote in next.pending_quotes.iter_mut() {
            if quote.quote_id == quote_id {
                quote.minted = true;
            }
        }
        next.history.push(TransactionRecord {
            direction: TransactionDirection::In,
            kind: TransactionKind::LightningReceive,
            amount: credited,
            memo: None,
            created_at: next.updated_at,
        });

        self.store.save_wallet(&pubkey, &next).await?;
        session.state = Some(next);

        info!(credited, quote_id, "paid invoice minted into proofs");
        Ok(true)
    }

    /// Melt proofs to pay an outgoing lightning invoice; unused fee reserve
    /// comes back as change
    pub async fn pay_lightning_invoice(&self, invoice: &str) -> WalletResult<u64> {
        let mut session = self.session.lock().await;
        let pubkey = session.pubkey.ok_or(WalletError::NotInitialized)?;
        let state = session.state.as_ref().ok_or(WalletError::NoWallet)?;

        let quote = self.mint.create_melt_quote(&state.mint_url, invoice).await?;
        let required = quote.amount.saturating_add(quote.fee_reserve);

        let available = state.balance();
        if available < required {
            return Err(WalletError::InsufficientBalance { available, required });
        }

        let inputs = match select_proofs(&state.proofs, required)
            .ok_or(WalletError::InsufficientBalance { available, required })?
        {
            Selection::Exact(picked) => picked,
            Selection::NeedsSwap { inputs, .. } => inputs,
        };

        let outcome = self.mint.melt(&state.mint_url, &quote.quote_id, inputs.clone()).await?;
        if !outcome.paid {
            return Err(WalletError::Mint(crate::mint::MintError::QuoteNotPaid {
                quote_id: quote.quote_id.clone(),
            }));
        }

        let mut next = state.clone();
        next.proofs = remove_proofs(&next.proofs, &inputs);
        let (merged, _) = merge_proofs(&next.proofs, outcome.change);
        next.proofs = merged;
        next.updated_at = unix_now();
        next.history.push(TransactionRecord {
            direction: TransactionDirection::Out,
            kind: TransactionKind::LightningSend,
            amount: quote.amount,
            memo: None,
            created_at: next.updated_at,
        });

        self.store.save_wallet(&pubkey, &next).await?;
        session.state = Some(next);

        info!(amount = quote.amount, "lightning invoice paid");
        Ok(quote.amount)
    }
}
