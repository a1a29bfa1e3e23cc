//! Wallet core: authoritative local proof state and mint operations
//!
//! This module owns the ecash side of the wallet: proof selection and
//! bookkeeping, the cashu token codec, local persistence and the mutexed
//! `WalletCore` that mediates every mint interaction.

pub mod core;
pub mod errors;
pub mod proofs;
pub mod store;
pub mod token;
pub mod types;

pub use core::{SendOutcome, WalletCore};
pub use errors::{WalletError, WalletResult};
pub use store::{JsonFileStore, LocalStore, MemoryStore, StoreError};
pub use token::{Token, TokenEntry};
pub use types::{
    normalize_mint_url, PendingQuote, Proof, QuoteState, TransactionDirection, TransactionKind,
    TransactionRecord, WalletState,
};
