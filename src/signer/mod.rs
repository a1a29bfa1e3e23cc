//! Unified signer management for both credential methods
//!
//! One signing capability regardless of whether the session holds a raw key
//! (`LocalKey`) or delegates to an out-of-process authority (`RemoteSigner`).
//! The active method is a closed enum persisted as a marker; legacy sessions
//! that predate method tagging are migrated once at resolution time by
//! detecting a stored raw key.

pub mod errors;
pub mod remote;

use std::sync::Arc;

use nostr::nips::nip44;
use nostr::{Event, EventBuilder, Keys, PublicKey};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::secure::SecureStore;
use crate::wallet::store::{LocalStore, METHOD_LOCAL_KEY, METHOD_REMOTE_SIGNER};

pub use errors::{AuthorityError, SignerError};
pub use remote::{RemoteSigner, SignerAuthority};

// =============================================================================
// Credential method
// =============================================================================

/// The two mutually-exclusive credential models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMethod {
    /// Raw private key held in-process; signs synchronously
    LocalKey,
    /// Out-of-process signer; signing is an async request/approval round trip
    RemoteSigner,
}

impl CredentialMethod {
    pub fn as_marker(&self) -> &'static str {
        match self {
            Self::LocalKey => METHOD_LOCAL_KEY,
            Self::RemoteSigner => METHOD_REMOTE_SIGNER,
        }
    }

    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            METHOD_LOCAL_KEY => Some(Self::LocalKey),
            METHOD_REMOTE_SIGNER => Some(Self::RemoteSigner),
            _ => None,
        }
    }
}

// =============================================================================
// Signer handle
// =============================================================================

/// The resolved signing capability for the active credential
#[derive(Clone)]
pub enum SignerHandle {
    Local(Keys),
    Remote(Arc<RemoteSigner>),
}

impl SignerHandle {
    pub fn method(&self) -> CredentialMethod {
        match self {
            Self::Local(_) => CredentialMethod::LocalKey,
            Self::Remote(_) => CredentialMethod::RemoteSigner,
        }
    }

    /// Whether the raw key is available in-process. Flows that need direct
    /// key access must gate on this; remote sessions can still sign.
    pub fn has_local_key(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub async fn public_key(&self) -> Result<PublicKey, SignerError> {
        match self {
            Self::Local(keys) => Ok(keys.public_key()),
            Self::Remote(remote) => remote.public_key().await,
        }
    }

    /// Sign a built event with the active credential
    pub async fn sign_builder(&self, builder: EventBuilder) -> Result<Event, SignerError> {
        match self {
            Self::Local(keys) => builder
                .sign_with_keys(keys)
                .map_err(|e| SignerError::Crypto(format!("event signing failed: {}", e))),
            Self::Remote(remote) => {
                let pubkey = remote.public_key().await?;
                remote.sign_event(builder.build(pubkey)).await
            }
        }
    }

    /// NIP-44 encrypt to our own key (backup records are self-encrypted)
    pub async fn nip44_self_encrypt(&self, plaintext: &str) -> Result<String, SignerError> {
        match self {
            Self::Local(keys) => {
                nip44::encrypt(keys.secret_key(), &keys.public_key(), plaintext, nip44::Version::V2)
                    .map_err(|e| SignerError::Crypto(format!("nip44 encrypt failed: {}", e)))
            }
            Self::Remote(remote) => {
                let own = remote.public_key().await?;
                remote.nip44_encrypt(&own, plaintext).await
            }
        }
    }

    /// NIP-44 decrypt content encrypted to our own key
    pub async fn nip44_self_decrypt(&self, ciphertext: &str) -> Result<String, SignerError> {
        match self {
            Self::Local(keys) => nip44::decrypt(keys.secret_key(), &keys.public_key(), ciphertext)
                .map_err(|e| SignerError::Crypto(format!("nip44 decrypt failed: {}", e))),
            Self::Remote(remote) => {
                let own = remote.public_key().await?;
                remote.nip44_decrypt(&own, ciphertext).await
            }
        }
    }
}

// =============================================================================
// Signer manager
// =============================================================================

/// Resolves, constructs and caches the active signer.
///
/// The resolved method and handle are cached for the process lifetime; the
/// cache must be cleared explicitly on logout or credential switch. The core
/// and sync layers obtain signing capability only through this manager.
pub struct SignerManager {
    secure: Arc<dyn SecureStore>,
    store: Arc<dyn LocalStore>,
    authority: Option<Arc<dyn SignerAuthority>>,
    sign_timeout: std::time::Duration,
    crypto_timeout: std::time::Duration,
    cached_method: RwLock<Option<CredentialMethod>>,
    cached_signer: RwLock<Option<SignerHandle>>,
}

impl SignerManager {
    pub fn new(
        secure: Arc<dyn SecureStore>,
        store: Arc<dyn LocalStore>,
        authority: Option<Arc<dyn SignerAuthority>>,
        config: &crate::config::WalletConfig,
    ) -> Self {
        Self {
            secure,
            store,
            authority,
            sign_timeout: config.sign_timeout,
            crypto_timeout: config.crypto_timeout,
            cached_method: RwLock::new(None),
            cached_signer: RwLock::new(None),
        }
    }

    /// Resolve the active credential method from persisted session markers.
    ///
    /// Legacy sessions without a marker are upgraded exactly once: a stored
    /// raw key means `LocalKey` and the marker is written back. An
    /// unrecognized marker resolves the same way instead of failing.
    pub async fn resolve_active_method(&self) -> Result<Option<CredentialMethod>, SignerError> {
        if let Some(method) = *self.cached_method.read().await {
            return Ok(Some(method));
        }

        let marker = self
            .store
            .load_method_marker()
            .await
            .map_err(|e| SignerError::Storage(e.to_string()))?;

        let resolved = match marker.as_deref().and_then(CredentialMethod::from_marker) {
            Some(method) => Some(method),
            None => {
                let has_key = self
                    .secure
                    .get()
                    .await
                    .map_err(|e| SignerError::Storage(e.to_string()))?
                    .is_some();
                if has_key {
                    info!("migrating legacy session to explicit local-key method");
                    self.store
                        .save_method_marker(METHOD_LOCAL_KEY)
                        .await
                        .map_err(|e| SignerError::Storage(e.to_string()))?;
                    Some(CredentialMethod::LocalKey)
                } else {
                    None
                }
            }
        };

        if let Some(method) = resolved {
            *self.cached_method.write().await = Some(method);
        }
        Ok(resolved)
    }

    /// Get (and cache) the signer for the active credential
    pub async fn signer(&self) -> Result<SignerHandle, SignerError> {
        if let Some(handle) = self.cached_signer.read().await.clone() {
            return Ok(handle);
        }

        let method = self
            .resolve_active_method()
            .await?
            .ok_or(SignerError::NoCredential)?;

        let handle = match method {
            CredentialMethod::LocalKey => {
                let raw = self
                    .secure
                    .get()
                    .await
                    .map_err(|e| SignerError::Storage(e.to_string()))?
                    .ok_or(SignerError::NoCredential)?;
                let keys = Keys::parse(&raw)
                    .map_err(|e| SignerError::InvalidCredential(format!("stored key unparseable: {}", e)))?;
                SignerHandle::Local(keys)
            }
            CredentialMethod::RemoteSigner => {
                let authority = self
                    .authority
                    .clone()
                    .ok_or_else(|| SignerError::Unreachable("no signer authority registered".to_string()))?;
                SignerHandle::Remote(Arc::new(RemoteSigner::new(
                    authority,
                    self.sign_timeout,
                    self.crypto_timeout,
                )))
            }
        };

        debug!(method = handle.method().as_marker(), "signer resolved");
        *self.cached_signer.write().await = Some(handle.clone());
        Ok(handle)
    }

    /// Record a credential switch: persist the marker and drop caches
    pub async fn set_method(&self, method: CredentialMethod) -> Result<(), SignerError> {
        self.store
            .save_method_marker(method.as_marker())
            .await
            .map_err(|e| SignerError::Storage(e.to_string()))?;
        self.clear_cache().await;
        Ok(())
    }

    /// Drop the cached method and signer; must be called on logout or
    /// credential switch
    pub async fn clear_cache(&self) {
        *self.cached_method.write().await = None;
        *self.cached_signer.write().await = None;
    }

    /// Full logout: caches, marker and the raw key itself
    pub async fn logout(&self) -> Result<(), SignerError> {
        self.clear_cache().await;
        self.store
            .clear_method_marker()
            .await
            .map_err(|e| SignerError::Storage(e.to_string()))?;
        self.secure
            .clear()
            .await
            .map_err(|e| SignerError::Storage(e.to_string()))?;
        Ok(())
    }
}
