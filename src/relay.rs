//! Relay transport seam
//!
//! The relay network is best-effort pub/sub: unordered, possibly duplicating,
//! possibly down. `RelayTransport` is the narrow interface the sync layer
//! uses; `NostrRelayPool` is the production implementation over the
//! `nostr-sdk` relay pool client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use nostr::{Event, Filter};
use nostr_sdk::Client;
use tracing::{debug, info, warn};

/// Relay error type
#[derive(Debug)]
pub enum RelayError {
    /// No relay connection; callers defer the operation, they do not fail
    Disconnected,
    /// Event was built but no relay accepted it
    Publish(String),
    /// Fetch did not complete in time; read as "no data", not a hard error
    Timeout,
    Internal(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Not connected to any relay"),
            Self::Publish(msg) => write!(f, "Failed to publish event: {}", msg),
            Self::Timeout => write!(f, "Relay fetch timed out"),
            Self::Internal(msg) => write!(f, "Relay error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

impl RelayError {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Async transport over the relay network.
///
/// Events handed to `publish` are already signed; fetches are one-shot
/// filtered reads bounded by `timeout`. Implementations own reconnection.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Establish connections; returns once at least an attempt was made.
    /// Connection failures surface later as `Disconnected` on use.
    async fn connect(&self) -> Result<(), RelayError>;

    async fn is_connected(&self) -> bool;

    async fn publish(&self, event: Event) -> Result<(), RelayError>;

    async fn fetch(&self, filter: Filter, timeout: Duration) -> Result<Vec<Event>, RelayError>;

    async fn disconnect(&self);
}

// =============================================================================
// nostr-sdk relay pool implementation
// =============================================================================

/// Default relays for wallet sync traffic
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.primal.net",
    "wss://relay.nostr.band",
];

/// Production transport backed by the `nostr-sdk` relay pool
pub struct NostrRelayPool {
    client: Client,
    relay_urls: Vec<String>,
}

impl NostrRelayPool {
    pub fn new(relay_urls: Vec<String>) -> Self {
        Self {
            client: Client::builder().build(),
            relay_urls,
        }
    }

    /// Wait until at least one relay is connected, driving connection
    /// attempts if none are. `connect()` is non-blocking in the pool, so a
    /// fetch right after it can race the handshake.
    async fn ensure_ready(&self) -> bool {
        use nostr_relay_pool::RelayStatus;

        let relays = self.client.relays().await;
        if relays.values().any(|r| r.status() == RelayStatus::Connected) {
            return true;
        }

        debug!("no relays connected, driving connect before fetch");
        self.client.connect().await;

        let relays = self.client.relays().await;
        let connected = relays
            .values()
            .filter(|r| r.status() == RelayStatus::Connected)
            .count();
        if connected == 0 {
            warn!("relay pool has no connected relays; operations will be deferred");
            false
        } else {
            debug!(connected, "relay pool ready");
            true
        }
    }
}

#[async_trait]
impl RelayTransport for NostrRelayPool {
    async fn connect(&self) -> Result<(), RelayError> {
        for url in &self.relay_urls {
            if let Err(e) = self.client.add_relay(url.as_str()).await {
                warn!(relay = %url, "failed to add relay: {}", e);
            }
        }
        self.client.connect().await;
        info!(relays = self.relay_urls.len(), "relay pool connecting");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        use nostr_relay_pool::RelayStatus;
        self.client
            .relays()
            .await
            .values()
            .any(|r| r.status() == RelayStatus::Connected)
    }

    async fn publish(&self, event: Event) -> Result<(), RelayError> {
        if !self.ensure_ready().await {
            return Err(RelayError::Disconnected);
        }
        self.client
            .send_event(&event)
            .await
            .map_err(|e| RelayError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, filter: Filter, timeout: Duration) -> Result<Vec<Event>, RelayError> {
        if !self.ensure_ready().await {
            return Err(RelayError::Disconnected);
        }
        match self.client.fetch_events(filter, timeout).await {
            Ok(events) => Ok(events.into_iter().collect()),
            Err(e) => {
                // The pool reports per-relay timeouts as errors; the sync
                // layer reads both as "nothing found right now"
                debug!("relay fetch failed: {}", e);
                Err(RelayError::Timeout)
            }
        }
    }

    async fn disconnect(&self) {
        self.client.disconnect().await;
    }
}
