//! Notification sink seam
//!
//! Outward-only: the wallet records user-facing notifications (a claimed
//! nutzap, a funded invoice) and never blocks on the sink. Delivery is the
//! host app's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Kinds of notifications the wallet raises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// An incoming nutzap was redeemed into the wallet
    NutzapClaimed,
    /// A lightning invoice we issued was paid and minted
    InvoicePaid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Amount in sats, when the notification is about money moving
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Fire-and-forget notification sink; implementations must not block
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Sink that drops everything; the default when the host wires nothing up
pub struct NullSink;

#[async_trait]
impl NotificationSink for NullSink {
    async fn notify(&self, _notification: Notification) {}
}

/// Sink that records notifications in memory; used by tests and by hosts
/// that drain notifications on their own schedule
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.records.lock().await)
    }

    pub async fn all(&self) -> Vec<Notification> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: Notification) {
        self.records.lock().await.push(notification);
    }
}
