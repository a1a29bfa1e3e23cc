//! Secure credential store seam
//!
//! Raw private keys only ever live behind `SecureStore`, which the platform
//! backs with hardware-grade storage (Keychain, Keystore). The wallet never
//! writes key material to ordinary application storage.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Secure store error type
#[derive(Debug)]
pub enum SecureStoreError {
    Unavailable(String),
    Internal(String),
}

impl fmt::Display for SecureStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "Secure storage unavailable: {}", msg),
            Self::Internal(msg) => write!(f, "Secure storage error: {}", msg),
        }
    }
}

impl std::error::Error for SecureStoreError {}

/// Hardware-backed-or-equivalent confidential storage for the raw key
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Persist the raw private key (hex or bech32 `nsec`)
    async fn store(&self, raw_key: &str) -> Result<(), SecureStoreError>;

    /// Fetch the stored key, if any
    async fn get(&self) -> Result<Option<String>, SecureStoreError>;

    /// Wipe the stored key
    async fn clear(&self) -> Result<(), SecureStoreError>;
}

/// In-memory secure store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemorySecureStore {
    key: RwLock<Option<String>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(raw_key: impl Into<String>) -> Self {
        Self {
            key: RwLock::new(Some(raw_key.into())),
        }
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn store(&self, raw_key: &str) -> Result<(), SecureStoreError> {
        *self.key.write().await = Some(raw_key.to_string());
        Ok(())
    }

    async fn get(&self) -> Result<Option<String>, SecureStoreError> {
        Ok(self.key.read().await.clone())
    }

    async fn clear(&self) -> Result<(), SecureStoreError> {
        *self.key.write().await = None;
        Ok(())
    }
}
