//! Mint seam
//!
//! The mint is an external, HTTP-based ecash issuer: trusted for issuance
//! semantics, never assumed reachable. The wallet talks to it only through
//! `MintClient`, which covers the four interactions the core needs: lightning
//! mint quotes (invoice in, proofs out), melt (proofs in, lightning out),
//! swap (split proofs for change) and token redemption.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::wallet::token::Token;
use crate::wallet::types::{Proof, QuoteState};

// =============================================================================
// Quote and swap types
// =============================================================================

/// A lightning invoice quote issued by the mint (NUT-04 shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintQuote {
    pub quote_id: String,
    /// BOLT11 payment request the user pays to fund the wallet
    pub payment_request: String,
    pub amount: u64,
    pub state: QuoteState,
}

/// A melt quote for paying an outgoing lightning invoice (NUT-05 shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeltQuote {
    pub quote_id: String,
    /// Invoice amount in sats
    pub amount: u64,
    /// Fee reserve the mint requires on top of `amount`
    pub fee_reserve: u64,
}

/// Result of a swap round trip: a proof set for the requested amount plus
/// change proofs re-minted from the remainder of the inputs
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub send: Vec<Proof>,
    pub change: Vec<Proof>,
}

/// Result of melting proofs into a lightning payment
#[derive(Debug, Clone)]
pub struct MeltOutcome {
    pub paid: bool,
    /// Unused fee reserve returned as change proofs
    pub change: Vec<Proof>,
}

// =============================================================================
// Errors
// =============================================================================

/// Mint error type
#[derive(Debug)]
pub enum MintError {
    /// Transport failure; retryable
    Network { mint_url: String, message: String },
    /// One or more input proofs were already redeemed
    TokenAlreadySpent,
    /// Inputs are locked in another in-flight operation at the mint
    TokenPending,
    /// Inputs do not cover the requested outputs
    InsufficientInputs { provided: u64, required: u64 },
    QuoteNotPaid { quote_id: String },
    QuoteExpired { quote_id: String },
    /// Mint rejected the request shape
    Malformed(String),
    /// Mint returned something the client cannot interpret
    Protocol(String),
}

impl fmt::Display for MintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { mint_url, message } => {
                write!(f, "Failed to reach mint {}: {}", mint_url, message)
            }
            Self::TokenAlreadySpent => write!(f, "Token already spent"),
            Self::TokenPending => write!(f, "Token pending at mint"),
            Self::InsufficientInputs { provided, required } => {
                write!(f, "Inputs cover {} but {} required", provided, required)
            }
            Self::QuoteNotPaid { quote_id } => write!(f, "Quote not paid: {}", quote_id),
            Self::QuoteExpired { quote_id } => write!(f, "Quote expired: {}", quote_id),
            Self::Malformed(msg) => write!(f, "Mint rejected request: {}", msg),
            Self::Protocol(msg) => write!(f, "Unexpected mint response: {}", msg),
        }
    }
}

impl std::error::Error for MintError {}

impl MintError {
    /// True when the inputs were already redeemed; receive paths treat this
    /// as a harmless no-op rather than a failure. `TokenPending` is not
    /// spent: the lock may clear, so pending tokens stay retryable.
    pub fn is_token_spent(&self) -> bool {
        matches!(self, Self::TokenAlreadySpent)
    }

    /// True when the failure is connectivity rather than a protocol rejection
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

// =============================================================================
// Client trait
// =============================================================================

/// Async client for a cashu mint.
///
/// Every method is a network round trip and may stall; callers on hot paths
/// wrap calls in timeouts. Implementations must be idempotent-safe for
/// `redeem`: presenting the same secrets twice must fail with
/// `TokenAlreadySpent`, never double-issue.
#[async_trait]
pub trait MintClient: Send + Sync {
    /// Request a lightning invoice that, once paid, lets the wallet mint
    /// `amount` sats of proofs
    async fn create_mint_quote(
        &self,
        mint_url: &str,
        amount: u64,
        memo: Option<&str>,
    ) -> Result<MintQuote, MintError>;

    /// Poll the payment state of a mint quote
    async fn check_mint_quote(&self, mint_url: &str, quote_id: &str) -> Result<QuoteState, MintError>;

    /// Mint proofs for a paid quote
    async fn mint_proofs(&self, mint_url: &str, quote_id: &str, amount: u64) -> Result<Vec<Proof>, MintError>;

    /// Swap input proofs for a proof set of exactly `amount` plus change
    async fn swap(&self, mint_url: &str, inputs: Vec<Proof>, amount: u64) -> Result<SwapOutcome, MintError>;

    /// Redeem an external token into fresh proofs owned by this wallet
    async fn redeem(&self, mint_url: &str, token: &Token) -> Result<Vec<Proof>, MintError>;

    /// Quote the cost of paying a lightning invoice from this wallet
    async fn create_melt_quote(&self, mint_url: &str, invoice: &str) -> Result<MeltQuote, MintError>;

    /// Melt input proofs to settle a quoted invoice
    async fn melt(&self, mint_url: &str, quote_id: &str, inputs: Vec<Proof>) -> Result<MeltOutcome, MintError>;
}
