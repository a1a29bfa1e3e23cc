//! Local-first cashu wallet with nostr-based sync.
//!
//! The local proof set is the source of truth; relays hold an encrypted,
//! replaceable mirror of it so a new device can reconstruct the wallet, and
//! incoming nutzaps (kind 9321) are claimed automatically in the background.
//!
//! Layering, bottom up:
//! - [`wallet`] owns proofs, the token codec, persistence and every mint
//!   interaction, serialized behind one mutex
//! - [`signer`] resolves the active credential (raw local key or an
//!   out-of-process remote signer) into one signing capability
//! - [`sync`] mirrors state to relays and runs the claim loop, best-effort
//! - [`facade`] is the host-facing surface tying it all together
//!
//! External collaborators (mint, relays, secure key storage, remote signer
//! authority, notifications) are trait seams so hosts can plug in their
//! platform implementations and tests can inject fakes.

pub mod config;
pub mod facade;
pub mod mint;
pub mod notify;
pub mod relay;
pub mod secure;
pub mod signer;
pub mod sync;
pub mod wallet;

pub use config::WalletConfig;
pub use facade::{SendNutzapResult, Wallet, WalletStatus};
pub use mint::{MintClient, MintError, MintQuote};
pub use notify::{Notification, NotificationKind, NotificationSink};
pub use relay::{NostrRelayPool, RelayError, RelayTransport};
pub use secure::{SecureStore, SecureStoreError};
pub use signer::{CredentialMethod, SignerAuthority, SignerError, SignerManager};
pub use sync::{ClaimOutcome, SyncMode, WalletSync};
pub use wallet::{
    JsonFileStore, LocalStore, MemoryStore, Proof, Token, WalletCore, WalletError, WalletState,
};
