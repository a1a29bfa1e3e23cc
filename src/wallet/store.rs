//! Local persistence seam
//!
//! `LocalStore` abstracts the on-device key-value storage behind async
//! methods: per-pubkey wallet state plus the global credential-method marker.
//! Ships an in-memory store (tests, ephemeral sessions) and a JSON-file store
//! (one file per pubkey) for native use.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use nostr::PublicKey;
use tokio::sync::RwLock;

use super::types::WalletState;

/// Storage error type
#[derive(Debug)]
pub enum StoreError {
    Io(String),
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "Storage I/O failed: {}", msg),
            Self::Corrupt(msg) => write!(f, "Stored data is corrupt: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persisted credential-method marker.
///
/// Stored as a plain string key so older installs that predate method tagging
/// can be detected (marker absent) and migrated once at startup.
pub const METHOD_LOCAL_KEY: &str = "local_key";
pub const METHOD_REMOTE_SIGNER: &str = "remote_signer";

#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn load_wallet(&self, pubkey: &PublicKey) -> Result<Option<WalletState>, StoreError>;
    async fn save_wallet(&self, pubkey: &PublicKey, state: &WalletState) -> Result<(), StoreError>;
    async fn clear_wallet(&self, pubkey: &PublicKey) -> Result<(), StoreError>;

    async fn load_method_marker(&self) -> Result<Option<String>, StoreError>;
    async fn save_method_marker(&self, marker: &str) -> Result<(), StoreError>;
    async fn clear_method_marker(&self) -> Result<(), StoreError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Volatile store; wallet state lives for the process lifetime only
#[derive(Default)]
pub struct MemoryStore {
    wallets: RwLock<HashMap<String, WalletState>>,
    method: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn load_wallet(&self, pubkey: &PublicKey) -> Result<Option<WalletState>, StoreError> {
        Ok(self.wallets.read().await.get(&pubkey.to_hex()).cloned())
    }

    async fn save_wallet(&self, pubkey: &PublicKey, state: &WalletState) -> Result<(), StoreError> {
        self.wallets.write().await.insert(pubkey.to_hex(), state.clone());
        Ok(())
    }

    async fn clear_wallet(&self, pubkey: &PublicKey) -> Result<(), StoreError> {
        self.wallets.write().await.remove(&pubkey.to_hex());
        Ok(())
    }

    async fn load_method_marker(&self) -> Result<Option<String>, StoreError> {
        Ok(self.method.read().await.clone())
    }

    async fn save_method_marker(&self, marker: &str) -> Result<(), StoreError> {
        *self.method.write().await = Some(marker.to_string());
        Ok(())
    }

    async fn clear_method_marker(&self) -> Result<(), StoreError> {
        *self.method.write().await = None;
        Ok(())
    }
}

// =============================================================================
// JSON file store
// =============================================================================

/// Durable store writing one JSON file per pubkey under a base directory,
/// plus a `method` marker file. Writes go through a temp file and rename so
/// a crash mid-write cannot corrupt the previous state.
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn wallet_path(&self, pubkey: &PublicKey) -> PathBuf {
        self.base_dir.join(format!("wallet-{}.json", pubkey.to_hex()))
    }

    fn method_path(&self) -> PathBuf {
        self.base_dir.join("credential-method")
    }

    async fn write_atomic(&self, path: &PathBuf, bytes: &[u8]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    async fn read_optional(&self, path: &PathBuf) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }

    async fn remove_if_present(&self, path: &PathBuf) -> Result<(), StoreError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn load_wallet(&self, pubkey: &PublicKey) -> Result<Option<WalletState>, StoreError> {
        match self.read_optional(&self.wallet_path(pubkey)).await? {
            Some(bytes) => {
                let state = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Corrupt(format!("wallet state: {}", e)))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn save_wallet(&self, pubkey: &PublicKey, state: &WalletState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(state)
            .map_err(|e| StoreError::Corrupt(format!("wallet state encode: {}", e)))?;
        self.write_atomic(&self.wallet_path(pubkey), &bytes).await
    }

    async fn clear_wallet(&self, pubkey: &PublicKey) -> Result<(), StoreError> {
        self.remove_if_present(&self.wallet_path(pubkey)).await
    }

    async fn load_method_marker(&self) -> Result<Option<String>, StoreError> {
        match self.read_optional(&self.method_path()).await? {
            Some(bytes) => Ok(Some(
                String::from_utf8(bytes)
                    .map_err(|e| StoreError::Corrupt(format!("method marker: {}", e)))?
                    .trim()
                    .to_string(),
            )),
            None => Ok(None),
        }
    }

    async fn save_method_marker(&self, marker: &str) -> Result<(), StoreError> {
        self.write_atomic(&self.method_path(), marker.as_bytes()).await
    }

    async fn clear_method_marker(&self) -> Result<(), StoreError> {
        self.remove_if_present(&self.method_path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::Keys;

    #[tokio::test]
    async fn memory_store_round_trips_wallet() {
        let store = MemoryStore::new();
        let keys = Keys::generate();
        let pubkey = keys.public_key();

        assert!(store.load_wallet(&pubkey).await.unwrap().is_none());

        let state = WalletState::new("https://mint.example.com", 1);
        store.save_wallet(&pubkey, &state).await.unwrap();
        assert_eq!(store.load_wallet(&pubkey).await.unwrap(), Some(state));

        store.clear_wallet(&pubkey).await.unwrap();
        assert!(store.load_wallet(&pubkey).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn method_marker_round_trips() {
        let store = MemoryStore::new();
        assert!(store.load_method_marker().await.unwrap().is_none());
        store.save_method_marker(METHOD_LOCAL_KEY).await.unwrap();
        assert_eq!(
            store.load_method_marker().await.unwrap().as_deref(),
            Some(METHOD_LOCAL_KEY)
        );
        store.clear_method_marker().await.unwrap();
        assert!(store.load_method_marker().await.unwrap().is_none());
    }
}
