//! Remote signer backend
//!
//! Wraps an out-of-process signer authority (an Amber-style intent/URI
//! approval flow) behind timeout-raced round trips. Requests are correlated
//! by a fresh uuid; responses are validated before use. Once the authority
//! reports a permanent block, every further request short-circuits for the
//! rest of the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nostr::{Event, JsonUtil, PublicKey, UnsignedEvent};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::{AuthorityError, SignerError};

/// Out-of-process signing authority.
///
/// Every call is one request/approval round trip; `request_id` correlates a
/// response with its request across the platform boundary. Implementations
/// resolve when the response arrives and return `Unreachable` when the
/// authority cannot be invoked at all. They never time out themselves; the
/// caller races the hard bound.
#[async_trait]
pub trait SignerAuthority: Send + Sync {
    /// Learn the authority's public key (first-use handshake)
    async fn get_public_key(&self, request_id: &str) -> Result<String, AuthorityError>;

    /// Sign an event; takes and returns canonical event JSON
    async fn sign_event(&self, request_id: &str, unsigned_json: &str) -> Result<String, AuthorityError>;

    /// NIP-44 encrypt to `peer_pubkey` (hex)
    async fn nip44_encrypt(
        &self,
        request_id: &str,
        peer_pubkey: &str,
        plaintext: &str,
    ) -> Result<String, AuthorityError>;

    /// NIP-44 decrypt from `peer_pubkey` (hex)
    async fn nip44_decrypt(
        &self,
        request_id: &str,
        peer_pubkey: &str,
        ciphertext: &str,
    ) -> Result<String, AuthorityError>;
}

/// Handle over a `SignerAuthority` with hard timeouts and a cached pubkey.
///
/// The pubkey handshake happens on first use and is cached for the handle's
/// lifetime; signing requests queue through the same authority channel.
pub struct RemoteSigner {
    authority: Arc<dyn SignerAuthority>,
    sign_timeout: Duration,
    crypto_timeout: Duration,
    pubkey: OnceCell<PublicKey>,
    blocked: AtomicBool,
}

impl RemoteSigner {
    pub fn new(authority: Arc<dyn SignerAuthority>, sign_timeout: Duration, crypto_timeout: Duration) -> Self {
        Self {
            authority,
            sign_timeout,
            crypto_timeout,
            pubkey: OnceCell::new(),
            blocked: AtomicBool::new(false),
        }
    }

    /// Race an authority round trip against `bound`, mapping authority
    /// failures into the signer taxonomy and latching permanent blocks
    async fn round_trip<T, F>(&self, operation: &'static str, bound: Duration, fut: F) -> Result<T, SignerError>
    where
        F: std::future::Future<Output = Result<T, AuthorityError>>,
    {
        if self.blocked.load(Ordering::Relaxed) {
            return Err(SignerError::Blocked);
        }

        match tokio::time::timeout(bound, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                if err == AuthorityError::Blocked {
                    warn!("signer authority permanently blocked this app");
                    self.blocked.store(true, Ordering::Relaxed);
                }
                Err(SignerError::from(err))
            }
            Err(_) => {
                warn!(operation, after_secs = bound.as_secs(), "signer round trip timed out");
                Err(SignerError::TimedOut { operation, after: bound })
            }
        }
    }

    /// Public key of the remote identity; first call performs the handshake
    pub async fn public_key(&self) -> Result<PublicKey, SignerError> {
        if let Some(pk) = self.pubkey.get() {
            return Ok(*pk);
        }

        let request_id = Uuid::new_v4().to_string();
        debug!(%request_id, "requesting public key from signer authority");
        let raw = self
            .round_trip("get_public_key", self.crypto_timeout, self.authority.get_public_key(&request_id))
            .await?;
        let pk = PublicKey::parse(&raw)
            .map_err(|e| SignerError::Malformed(format!("authority returned invalid pubkey: {}", e)))?;

        // A concurrent handshake may have won the race; keep the first value
        let _ = self.pubkey.set(pk);
        Ok(*self.pubkey.get().unwrap_or(&pk))
    }

    /// Sign an unsigned event through the authority and verify the result
    pub async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, SignerError> {
        let expected_pubkey = unsigned.pubkey;
        let request_id = Uuid::new_v4().to_string();
        debug!(%request_id, kind = unsigned.kind.as_u16(), "requesting event signature");

        let signed_json = self
            .round_trip(
                "sign_event",
                self.sign_timeout,
                self.authority.sign_event(&request_id, &unsigned.as_json()),
            )
            .await?;

        let event = Event::from_json(&signed_json)
            .map_err(|e| SignerError::Malformed(format!("authority returned invalid event: {}", e)))?;
        if event.pubkey != expected_pubkey {
            return Err(SignerError::Malformed("signed event pubkey mismatch".to_string()));
        }
        event
            .verify()
            .map_err(|e| SignerError::Malformed(format!("signature verification failed: {}", e)))?;
        Ok(event)
    }

    pub async fn nip44_encrypt(&self, peer: &PublicKey, plaintext: &str) -> Result<String, SignerError> {
        let request_id = Uuid::new_v4().to_string();
        self.round_trip(
            "nip44_encrypt",
            self.crypto_timeout,
            self.authority.nip44_encrypt(&request_id, &peer.to_hex(), plaintext),
        )
        .await
    }

    pub async fn nip44_decrypt(&self, peer: &PublicKey, ciphertext: &str) -> Result<String, SignerError> {
        let request_id = Uuid::new_v4().to_string();
        self.round_trip(
            "nip44_decrypt",
            self.crypto_timeout,
            self.authority.nip44_decrypt(&request_id, &peer.to_hex(), ciphertext),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::nips::nip44;
    use nostr::Keys;

    /// Authority backed by local keys, with scripted failures
    struct ScriptedAuthority {
        keys: Keys,
        fail_with: Option<AuthorityError>,
    }

    #[async_trait]
    impl SignerAuthority for ScriptedAuthority {
        async fn get_public_key(&self, _request_id: &str) -> Result<String, AuthorityError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            Ok(self.keys.public_key().to_hex())
        }

        async fn sign_event(&self, _request_id: &str, unsigned_json: &str) -> Result<String, AuthorityError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            let unsigned = UnsignedEvent::from_json(unsigned_json)
                .map_err(|e| AuthorityError::Malformed(e.to_string()))?;
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

    fn remote_with(fail_with: Option<AuthorityError>) -> RemoteSigner {
        RemoteSigner::new(
            Arc::new(ScriptedAuthority {
                keys: Keys::generate(),
                fail_with,
            }),
            Duration::from_secs(60),
            Duration::from_secs(15),
        )
    }

    #[tokio::test]
    async fn pubkey_handshake_is_cached() {
        let remote = remote_with(None);
        let first = remote.public_key().await.unwrap();
        let second = remote.public_key().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn block_latches_for_the_session() {
        let remote = remote_with(Some(AuthorityError::Blocked));
        assert!(matches!(remote.public_key().await, Err(SignerError::Blocked)));
        // Second call short-circuits without another round trip
        assert!(matches!(remote.public_key().await, Err(SignerError::Blocked)));
    }

    #[tokio::test]
    async fn decline_maps_to_declined() {
        let remote = remote_with(Some(AuthorityError::Declined));
        assert!(matches!(remote.public_key().await, Err(SignerError::Declined)));
    }
}
