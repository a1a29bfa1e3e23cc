//! Wallet data types
//!
//! All data structures owned by the wallet core: proofs, wallet state,
//! transaction history and pending lightning quotes.

use serde::{Deserialize, Serialize};

/// Default unit for proofs (defaults to "sat", matching NIP-60)
pub fn default_unit() -> String {
    "sat".to_string()
}

// =============================================================================
// Proofs
// =============================================================================

/// A single bearer ecash proof issued by a mint.
///
/// Serde shape matches the cashu proof JSON (`id`, `amount`, `secret`, `C`),
/// so proofs round-trip unchanged through tokens and encrypted backups.
/// Two proofs with the same `secret` are the same proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Keyset id the proof was signed under
    #[serde(default)]
    pub id: String,
    /// Amount in satoshis
    pub amount: u64,
    /// Mint-specific secret; the dedup key for the proof
    pub secret: String,
    /// Unblinded mint signature
    #[serde(rename = "C")]
    pub c: String,
    /// Witness for spending conditions, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<String>,
    /// DLEQ proof, passed through opaquely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dleq: Option<serde_json::Value>,
}

impl Proof {
    pub fn new(id: impl Into<String>, amount: u64, secret: impl Into<String>, c: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            amount,
            secret: secret.into(),
            c: c.into(),
            witness: None,
            dleq: None,
        }
    }
}

// =============================================================================
// Wallet state
// =============================================================================

/// Per-pubkey wallet aggregate, owned exclusively by the wallet core.
///
/// Mutated only through core operations; every mutation replaces the proof
/// set wholesale and bumps `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletState {
    /// Active mint URL (normalized, no trailing slash)
    pub mint_url: String,
    /// Held, unspent proofs; their sum is the spendable balance
    pub proofs: Vec<Proof>,
    /// Monotonically increasing last-updated marker (unix seconds)
    pub updated_at: u64,
    /// Lightning mint quotes awaiting payment or minting
    #[serde(default)]
    pub pending_quotes: Vec<PendingQuote>,
    /// Local transaction history, newest last
    #[serde(default)]
    pub history: Vec<TransactionRecord>,
    /// Nutzap event ids already redeemed by this wallet
    #[serde(default)]
    pub claimed_event_ids: Vec<String>,
}

impl WalletState {
    pub fn new(mint_url: impl Into<String>, now: u64) -> Self {
        Self {
            mint_url: normalize_mint_url(mint_url),
            proofs: Vec::new(),
            updated_at: now,
            pending_quotes: Vec::new(),
            history: Vec::new(),
            claimed_event_ids: Vec::new(),
        }
    }

    /// Sum of held proof amounts; saturates rather than wrapping on overflow
    pub fn balance(&self) -> u64 {
        self.proofs.iter().fold(0u64, |acc, p| acc.saturating_add(p.amount))
    }

    pub fn has_claimed(&self, event_id: &str) -> bool {
        self.claimed_event_ids.iter().any(|id| id == event_id)
    }
}

/// Normalize a mint URL so the same mint always maps to the same identifier
pub fn normalize_mint_url(url: impl Into<String>) -> String {
    let url = url.into();
    let trimmed = url.trim().trim_end_matches('/');
    trimmed.to_lowercase()
}

// =============================================================================
// Lightning quotes
// =============================================================================

/// State of a lightning mint quote as reported by the mint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteState {
    Unpaid,
    Paid,
    Issued,
    Expired,
}

/// A mint quote we created and may still need to mint proofs for.
///
/// `minted` guards against minting the same paid quote twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingQuote {
    pub quote_id: String,
    pub amount: u64,
    pub payment_request: String,
    pub minted: bool,
    pub created_at: u64,
}

// =============================================================================
// Transaction history
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionDirection {
    In,
    Out,
}

/// What produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Outgoing ecash token (nutzap or direct send)
    Send,
    /// Incoming ecash token redeemed into the wallet
    Receive,
    /// Incoming nutzap claimed by the background loop
    NutzapClaim,
    /// Lightning invoice paid into the wallet (minted proofs)
    LightningReceive,
    /// Proofs melted to pay a lightning invoice
    LightningSend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub direction: TransactionDirection,
    pub kind: TransactionKind,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_sums_proofs() {
        let mut state = WalletState::new("https://mint.example.com", 0);
        state.proofs.push(Proof::new("ks1", 100, "s1", "c1"));
        state.proofs.push(Proof::new("ks1", 400, "s2", "c2"));
        assert_eq!(state.balance(), 500);
    }

    #[test]
    fn mint_url_normalization_is_stable() {
        assert_eq!(
            normalize_mint_url("https://Mint.Example.com/"),
            normalize_mint_url("https://mint.example.com")
        );
    }

    #[test]
    fn proof_serde_uses_capital_c() {
        let proof = Proof::new("ks1", 8, "secret", "02abc");
        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(json["C"], "02abc");
        assert!(json.get("witness").is_none());
    }
}
