//! Wallet error types
//!
//! Typed error handling for the wallet core and facade. Local, deterministic
//! failures (insufficient balance, missing wallet) get their own variants so
//! callers can match on them; network-dependent failures carry the underlying
//! mint/relay/signer error.

use std::fmt;

use crate::mint::MintError;
use crate::relay::RelayError;
use crate::signer::SignerError;
use crate::wallet::store::StoreError;

/// Wallet error type
#[derive(Debug)]
pub enum WalletError {
    // ==========================================================================
    // Initialization
    // ==========================================================================
    /// No wallet exists locally or on relays for this pubkey
    NoWallet,
    /// Operation requires an initialized wallet session
    NotInitialized,
    /// A wallet already exists; creation is explicit and one-time
    AlreadyExists,

    // ==========================================================================
    // Spending
    // ==========================================================================
    InsufficientBalance { available: u64, required: u64 },
    /// Zero-amount send; claims skip zero amounts, sends reject them
    ZeroAmount,
    /// Token string could not be decoded
    InvalidToken { reason: String },
    /// Token targets a different mint than the active wallet
    MintMismatch { token_mint: String, wallet_mint: String },

    // ==========================================================================
    // Lightning
    // ==========================================================================
    QuoteNotFound { quote_id: String },

    // ==========================================================================
    // External collaborators
    // ==========================================================================
    Mint(MintError),
    Relay(RelayError),
    Signer(SignerError),
    Store(StoreError),

    Internal(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWallet => write!(f, "No wallet found for this account"),
            Self::NotInitialized => write!(f, "Wallet not initialized"),
            Self::AlreadyExists => write!(f, "Wallet already exists"),

            Self::InsufficientBalance { available, required } => {
                write!(f, "Insufficient balance: available={}, required={}", available, required)
            }
            Self::ZeroAmount => write!(f, "Amount must be greater than zero"),
            Self::InvalidToken { reason } => write!(f, "Invalid token: {}", reason),
            Self::MintMismatch { token_mint, wallet_mint } => {
                write!(f, "Token is from mint {} but wallet uses {}", token_mint, wallet_mint)
            }

            Self::QuoteNotFound { quote_id } => write!(f, "Quote not found: {}", quote_id),

            Self::Mint(err) => write!(f, "Mint error: {}", err),
            Self::Relay(err) => write!(f, "Relay error: {}", err),
            Self::Signer(err) => write!(f, "Signer error: {}", err),
            Self::Store(err) => write!(f, "Storage error: {}", err),

            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mint(err) => Some(err),
            Self::Relay(err) => Some(err),
            Self::Signer(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MintError> for WalletError {
    fn from(err: MintError) -> Self {
        Self::Mint(err)
    }
}

impl From<RelayError> for WalletError {
    fn from(err: RelayError) -> Self {
        Self::Relay(err)
    }
}

impl From<SignerError> for WalletError {
    fn from(err: SignerError) -> Self {
        Self::Signer(err)
    }
}

impl From<StoreError> for WalletError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Result type alias for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

impl WalletError {
    /// True for tokens the mint reports as already redeemed.
    ///
    /// Receive paths treat these as soft failures (credit zero, keep going).
    pub fn is_token_spent(&self) -> bool {
        matches!(self, Self::Mint(err) if err.is_token_spent())
    }

    /// True for insufficient-funds failures, local or mint-reported
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, Self::InsufficientBalance { .. })
            || matches!(self, Self::Mint(MintError::InsufficientInputs { .. }))
    }

    /// True when the failure is connectivity, not a protocol rejection
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Mint(err) => err.is_network(),
            Self::Relay(err) => err.is_disconnected() || err.is_timeout(),
            Self::Signer(err) => err.is_unreachable() || err.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spent_token_classifies_as_soft() {
        let err = WalletError::from(MintError::TokenAlreadySpent);
        assert!(err.is_token_spent());
        assert!(!err.is_connection_error());
    }

    #[test]
    fn pending_token_is_retryable_not_spent() {
        let err = WalletError::from(MintError::TokenPending);
        assert!(!err.is_token_spent());
    }

    #[test]
    fn insufficient_balance_is_local_and_typed() {
        let err = WalletError::InsufficientBalance { available: 100, required: 300 };
        assert!(err.is_insufficient_funds());
        assert_eq!(err.to_string(), "Insufficient balance: available=100, required=300");
    }
}
