//! Shared fakes for integration tests: an in-memory mint with a spent-secret
//! ledger, a relay that stores events and answers filters, and signer
//! authorities with scripted behavior.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nostr::nips::nip44;
use nostr::{Event, Filter, JsonUtil, Keys, PublicKey, UnsignedEvent};
use tokio::sync::Mutex;

use stride_wallet::mint::{MeltOutcome, MeltQuote, MintClient, MintError, MintQuote, SwapOutcome};
use stride_wallet::signer::{AuthorityError, SignerAuthority};
use stride_wallet::relay::{RelayError, RelayTransport};
use stride_wallet::wallet::types::QuoteState;
use stride_wallet::wallet::Proof;
use stride_wallet::Token;

pub const MINT_URL: &str = "https://mint.example.com";

// =============================================================================
// Fake mint
// =============================================================================

/// In-memory mint. Tracks spent secrets so double redemption fails the same
/// way a real mint would, and counts round trips so tests can assert which
/// paths touched the network.
pub struct FakeMint {
    spent: Mutex<HashSet<String>>,
    pending: Mutex<HashSet<String>>,
    quotes: Mutex<HashMap<String, (u64, QuoteState)>>,
    melt_quotes: Mutex<HashMap<String, (u64, u64)>>,
    fresh_counter: AtomicU64,
    fail_next_swap: AtomicBool,
    pub swap_calls: AtomicUsize,
    pub mint_calls: AtomicUsize,
}

impl FakeMint {
    pub fn new() -> Self {
        Self {
            spent: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashSet::new()),
            quotes: Mutex::new(HashMap::new()),
            melt_quotes: Mutex::new(HashMap::new()),
            fresh_counter: AtomicU64::new(0),
            fail_next_swap: AtomicBool::new(false),
            swap_calls: AtomicUsize::new(0),
            mint_calls: AtomicUsize::new(0),
        }
    }

    /// Make the next swap fail with a network error after inputs were sent
    pub fn fail_next_swap(&self) {
        self.fail_next_swap.store(true, Ordering::SeqCst);
    }

    /// Lock a secret in a simulated in-flight operation; redeeming it fails
    /// with `TokenPending` until released
    pub async fn mark_pending(&self, secret: &str) {
        self.pending.lock().await.insert(secret.to_string());
    }

    pub async fn release_pending(&self, secret: &str) {
        self.pending.lock().await.remove(secret);
    }

    /// Issue fresh proofs summing `amount`, decomposed into powers of two
    pub fn issue(&self, amount: u64) -> Vec<Proof> {
        let mut proofs = Vec::new();
        let mut remaining = amount;
        let mut denom = 1u64 << 62;
        while remaining > 0 {
            while denom > remaining {
                denom >>= 1;
            }
            let n = self.fresh_counter.fetch_add(1, Ordering::SeqCst);
            proofs.push(Proof::new("fake-keyset", denom, format!("fake-secret-{}", n), format!("02c{}", n)));
            remaining -= denom;
        }
        proofs
    }

    /// Simulate the user paying a lightning invoice
    pub async fn settle_invoice(&self, quote_id: &str) {
        if let Some((_, state)) = self.quotes.lock().await.get_mut(quote_id) {
            *state = QuoteState::Paid;
        }
    }

    pub async fn expire_quote(&self, quote_id: &str) {
        if let Some((_, state)) = self.quotes.lock().await.get_mut(quote_id) {
            *state = QuoteState::Expired;
        }
    }

    async fn consume(&self, inputs: &[Proof]) -> Result<u64, MintError> {
        {
            let pending = self.pending.lock().await;
            if inputs.iter().any(|p| pending.contains(&p.secret)) {
                return Err(MintError::TokenPending);
            }
        }
        let mut spent = self.spent.lock().await;
        for proof in inputs {
            if spent.contains(&proof.secret) {
                return Err(MintError::TokenAlreadySpent);
            }
        }
        for proof in inputs {
            spent.insert(proof.secret.clone());
        }
        Ok(inputs.iter().map(|p| p.amount).sum())
    }
}

#[async_trait]
impl MintClient for FakeMint {
    async fn create_mint_quote(
        &self,
        _mint_url: &str,
        amount: u64,
        _memo: Option<&str>,
    ) -> Result<MintQuote, MintError> {
        let n = self.fresh_counter.fetch_add(1, Ordering::SeqCst);
        let quote_id = format!("quote-{}", n);
        self.quotes
            .lock()
            .await
            .insert(quote_id.clone(), (amount, QuoteState::Unpaid));
        Ok(MintQuote {
            quote_id: quote_id.clone(),
            payment_request: format!("lnbc-fake-{}", quote_id),
            amount,
            state: QuoteState::Unpaid,
        })
    }

    async fn check_mint_quote(&self, _mint_url: &str, quote_id: &str) -> Result<QuoteState, MintError> {
        self.quotes
            .lock()
            .await
            .get(quote_id)
            .map(|(_, state)| *state)
            .ok_or_else(|| MintError::Protocol(format!("unknown quote {}", quote_id)))
    }

    async fn mint_proofs(&self, _mint_url: &str, quote_id: &str, amount: u64) -> Result<Vec<Proof>, MintError> {
        self.mint_calls.fetch_add(1, Ordering::SeqCst);
        let mut quotes = self.quotes.lock().await;
        match quotes.get_mut(quote_id) {
            Some((_, state @ QuoteState::Paid)) => {
                *state = QuoteState::Issued;
                Ok(self.issue(amount))
            }
            Some((_, QuoteState::Issued)) => Err(MintError::Protocol("quote already issued".into())),
            Some(_) => Err(MintError::QuoteNotPaid {
                quote_id: quote_id.to_string(),
            }),
            None => Err(MintError::Protocol(format!("unknown quote {}", quote_id))),
        }
    }

    async fn swap(&self, mint_url: &str, inputs: Vec<Proof>, amount: u64) -> Result<SwapOutcome, MintError> {
        self.swap_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_swap.swap(false, Ordering::SeqCst) {
            return Err(MintError::Network {
                mint_url: mint_url.to_string(),
                message: "connection reset".into(),
            });
        }
        let total = self.consume(&inputs).await?;
        if total < amount {
            return Err(MintError::InsufficientInputs {
                provided: total,
                required: amount,
            });
        }
        Ok(SwapOutcome {
            send: self.issue(amount),
            change: self.issue(total - amount),
        })
    }

    async fn redeem(&self, _mint_url: &str, token: &Token) -> Result<Vec<Proof>, MintError> {
        let inputs = token.proofs();
        let total = self.consume(&inputs).await?;
        Ok(self.issue(total))
    }

    async fn create_melt_quote(&self, _mint_url: &str, invoice: &str) -> Result<MeltQuote, MintError> {
        // Test invoices carry their amount: "lnbc:<amount>"
        let amount = invoice
            .strip_prefix("lnbc:")
            .and_then(|a| a.parse::<u64>().ok())
            .ok_or_else(|| MintError::Malformed(format!("unparseable invoice {}", invoice)))?;
        let n = self.fresh_counter.fetch_add(1, Ordering::SeqCst);
        let quote_id = format!("melt-{}", n);
        self.melt_quotes.lock().await.insert(quote_id.clone(), (amount, 2));
        Ok(MeltQuote {
            quote_id,
            amount,
            fee_reserve: 2,
        })
    }

    async fn melt(&self, _mint_url: &str, quote_id: &str, inputs: Vec<Proof>) -> Result<MeltOutcome, MintError> {
        let (amount, fee) = self
            .melt_quotes
            .lock()
            .await
            .get(quote_id)
            .copied()
            .ok_or_else(|| MintError::Protocol(format!("unknown melt quote {}", quote_id)))?;
        let total = self.consume(&inputs).await?;
        // Fee reserve is consumed whole; anything above it comes back
        let change = total.saturating_sub(amount + fee);
        Ok(MeltOutcome {
            paid: true,
            change: if change > 0 { self.issue(change) } else { Vec::new() },
        })
    }
}

// =============================================================================
// Fake relay
// =============================================================================

/// In-memory relay. `publish` applies replaceable-event semantics; `seed`
/// appends unconditionally, simulating records accumulated across divergent
/// relays.
pub struct FakeRelay {
    events: Mutex<Vec<Event>>,
    connected: AtomicBool,
    backup_fetch_delay_ms: AtomicU64,
    pub publishes: AtomicUsize,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            backup_fetch_delay_ms: AtomicU64::new(0),
            publishes: AtomicUsize::new(0),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Answer backup-record queries slower than everything else, the way a
    /// loaded relay serving large encrypted events would
    pub fn slow_backup_fetches(&self, delay: Duration) {
        self.backup_fetch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Store an event without replaceable semantics
    pub async fn seed(&self, event: Event) {
        self.events.lock().await.push(event);
    }

    pub async fn stored(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    fn d_tag(event: &Event) -> Option<String> {
        event.tags.iter().find_map(|tag| {
            let slice = tag.as_slice();
            if slice.first().map(|s| s.as_str()) == Some("d") {
                slice.get(1).cloned()
            } else {
                None
            }
        })
    }

    fn matches(filter: &serde_json::Value, event: &Event) -> bool {
        if let Some(kinds) = filter.get("kinds").and_then(|v| v.as_array()) {
            let kind = event.kind.as_u16() as u64;
            if !kinds.iter().any(|k| k.as_u64() == Some(kind)) {
                return false;
            }
        }
        if let Some(authors) = filter.get("authors").and_then(|v| v.as_array()) {
            let author = event.pubkey.to_hex();
            if !authors.iter().any(|a| a.as_str() == Some(author.as_str())) {
                return false;
            }
        }
        if let Some(ps) = filter.get("#p").and_then(|v| v.as_array()) {
            let tagged = event.tags.iter().any(|tag| {
                let slice = tag.as_slice();
                slice.first().map(|s| s.as_str()) == Some("p")
                    && slice
                        .get(1)
                        .map(|v| ps.iter().any(|p| p.as_str() == Some(v.as_str())))
                        .unwrap_or(false)
            });
            if !tagged {
                return false;
            }
        }
        if let Some(since) = filter.get("since").and_then(|v| v.as_u64()) {
            if event.created_at.as_secs() < since {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl RelayTransport for FakeRelay {
    async fn connect(&self) -> Result<(), RelayError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, event: Event) -> Result<(), RelayError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RelayError::Disconnected);
        }
        self.publishes.fetch_add(1, Ordering::SeqCst);
        let mut events = self.events.lock().await;
        // Parameterized-replaceable kinds keep one event per (pubkey, kind, d)
        if event.kind.as_u16() >= 30_000 && event.kind.as_u16() < 40_000 {
            let d = Self::d_tag(&event);
            events.retain(|e| {
                !(e.kind == event.kind && e.pubkey == event.pubkey && Self::d_tag(e) == d)
            });
        }
        events.push(event);
        Ok(())
    }

    async fn fetch(&self, filter: Filter, _timeout: Duration) -> Result<Vec<Event>, RelayError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RelayError::Disconnected);
        }
        let filter_json: serde_json::Value = serde_json::from_str(&filter.as_json())
            .map_err(|e| RelayError::Internal(e.to_string()))?;
        let delay_ms = self.backup_fetch_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            let wants_backups = filter_json
                .get("kinds")
                .and_then(|v| v.as_array())
                .map(|kinds| {
                    kinds
                        .iter()
                        .any(|k| k.as_u64() == Some(u64::from(stride_wallet::sync::events::KIND_TOKEN_BACKUP)))
                })
                .unwrap_or(false);
            if wants_backups {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .filter(|e| Self::matches(&filter_json, e))
            .cloned()
            .collect())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Signer authorities
// =============================================================================

/// Authority backed by local keys that answers every request
pub struct KeyBackedAuthority {
    pub keys: Keys,
}

#[async_trait]
impl SignerAuthority for KeyBackedAuthority {
    async fn get_public_key(&self, _request_id: &str) -> Result<String, AuthorityError> {
        Ok(self.keys.public_key().to_hex())
    }

    async fn sign_event(&self, _request_id: &str, unsigned_json: &str) -> Result<String, AuthorityError> {
        let unsigned =
            UnsignedEvent::from_json(unsigned_json).map_err(|e| AuthorityError::Malformed(e.to_string()))?;
        let event = unsigned
            .sign_with_keys(&self.keys)
            .map_err(|e| AuthorityError::Malformed(e.to_string()))?;
        Ok(event.as_json())
    }

    async fn nip44_encrypt(
        &self,
        _request_id: &str,
        peer_pubkey: &str,
        plaintext: &str,
    ) -> Result<String, AuthorityError> {
        let peer = PublicKey::parse(peer_pubkey).map_err(|e| AuthorityError::Malformed(e.to_string()))?;
        nip44::encrypt(self.keys.secret_key(), &peer, plaintext, nip44::Version::V2)
            .map_err(|e| AuthorityError::Malformed(e.to_string()))
    }

    async fn nip44_decrypt(
        &self,
        _request_id: &str,
        peer_pubkey: &str,
        ciphertext: &str,
    ) -> Result<String, AuthorityError> {
        let peer = PublicKey::parse(peer_pubkey).map_err(|e| AuthorityError::Malformed(e.to_string()))?;
        nip44::decrypt(self.keys.secret_key(), &peer, ciphertext)
            .map_err(|e| AuthorityError::Malformed(e.to_string()))
    }
}

/// Authority whose signing requests never come back (user walked away from
/// the approval prompt). The pubkey handshake still answers so callers get
/// far enough to hit the signing bound.
pub struct StalledAuthority {
    pub keys: Keys,
}

#[async_trait]
impl SignerAuthority for StalledAuthority {
    async fn get_public_key(&self, _request_id: &str) -> Result<String, AuthorityError> {
        Ok(self.keys.public_key().to_hex())
    }

    async fn sign_event(&self, _request_id: &str, _unsigned_json: &str) -> Result<String, AuthorityError> {
        futures::future::pending().await
    }

    async fn nip44_encrypt(
        &self,
        _request_id: &str,
        _peer_pubkey: &str,
        _plaintext: &str,
    ) -> Result<String, AuthorityError> {
        futures::future::pending().await
    }

    async fn nip44_decrypt(
        &self,
        _request_id: &str,
        _peer_pubkey: &str,
        _ciphertext: &str,
    ) -> Result<String, AuthorityError> {
        futures::future::pending().await
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// A wallet-shaped proof with a distinct secret
pub fn proof(amount: u64, secret: &str) -> Proof {
    Proof::new("test-keyset", amount, secret, format!("02{}", secret))
}

/// Encode proofs as a redeemable token for `MINT_URL`
pub fn token_for(proofs: Vec<Proof>) -> String {
    // Token encoding is infallible for plain proof data
    Token::new(MINT_URL, proofs, None).encode().unwrap()
}

/// Sign a nutzap addressed to `recipient` carrying `token`
pub fn nutzap_event(sender: &Keys, recipient: PublicKey, amount: u64, token: &str) -> Event {
    stride_wallet::sync::events::build_nutzap(recipient, amount, MINT_URL, token, None)
        .sign_with_keys(sender)
        .unwrap()
}
