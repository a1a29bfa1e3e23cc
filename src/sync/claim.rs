//! Nutzap claim loop
//!
//! Periodically scans a bounded lookback window for incoming payment events
//! addressed to the user and redeems their embedded tokens through the core.
//! Each event is isolated: a malformed, foreign-mint or already-claimed event
//! is logged and skipped, never aborting the rest of the batch or the loop.

use std::sync::Arc;

use nostr::{PublicKey, Timestamp};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::notify::{Notification, NotificationKind};
use crate::wallet::token::Token;

use super::events::{nutzap_filter, parse_nutzap};
use super::tasks::TaskStatus;
use super::WalletSync;

/// Result of one claim pass, in sats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClaimOutcome {
    /// Amount actually credited this pass
    pub claimed: u64,
    /// Amount advertised across the events that were examined
    pub total: u64,
}

impl WalletSync {
    /// One claim pass over the lookback window.
    ///
    /// Idempotent: events already claimed are skipped locally, and a token
    /// redeemed elsewhere fails softly at the mint and credits nothing.
    pub async fn claim_nutzaps(&self, pubkey: PublicKey) -> ClaimOutcome {
        let since = Timestamp::now()
            .as_secs()
            .saturating_sub(self.config.claim_lookback.as_secs());

        let events = match self
            .relay
            .fetch(nutzap_filter(pubkey, since), self.config.relay_fetch_timeout)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                debug!("nutzap fetch failed, nothing to claim: {}", e);
                return ClaimOutcome::default();
            }
        };

        let mut outcome = ClaimOutcome::default();
        for event in &events {
            let Some(nutzap) = parse_nutzap(event) else {
                debug!(event_id = %event.id, "event is not a redeemable nutzap, skipping");
                continue;
            };
            if nutzap.amount == 0 {
                debug!(event_id = %nutzap.event_id, "zero-amount nutzap skipped");
                continue;
            }
            outcome.total = outcome.total.saturating_add(nutzap.amount);

            let token = match Token::decode(&nutzap.token) {
                Ok(token) => token,
                Err(e) => {
                    warn!(event_id = %nutzap.event_id, "nutzap carries an undecodable token: {}", e);
                    continue;
                }
            };

            match self.core.redeem_nutzap(&nutzap.event_id, token).await {
                Ok(0) => {
                    debug!(event_id = %nutzap.event_id, "nutzap credited nothing (claimed or spent)");
                }
                Ok(credited) => {
                    info!(credited, event_id = %nutzap.event_id, "nutzap claimed");
                    outcome.claimed = outcome.claimed.saturating_add(credited);
                    self.notify
                        .notify(Notification {
                            kind: NotificationKind::NutzapClaimed,
                            amount: credited,
                            memo: None,
                        })
                        .await;
                }
                Err(e) => {
                    // One bad event must not abort the batch
                    warn!(event_id = %nutzap.event_id, "nutzap claim failed: {}", e);
                }
            }
        }

        if outcome.claimed > 0 {
            // Local state changed; mirror it out, best-effort
            self.mirror_state().await;
        }
        outcome
    }

    /// Start the periodic claim loop. One failed iteration never stops the
    /// next; teardown cancels the loop via the shutdown channel.
    ///
    /// Callers must not start this before any relay restore has been adopted:
    /// the first pass runs immediately, and a claimed nutzap would otherwise
    /// create wallet state out from under the restore.
    pub fn start_claim_loop(self: &Arc<Self>, pubkey: PublicKey) {
        let sync = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sync.config.claim_interval);
            // First tick fires immediately; that is the initial catch-up scan
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let outcome = sync.claim_nutzaps(pubkey).await;
                        if outcome.claimed > 0 {
                            sync.tasks.record(
                                "claim_nutzaps",
                                TaskStatus::Success,
                                Some(format!("claimed {} sats", outcome.claimed)),
                            );
                        }
                        if outcome.claimed == 0 && outcome.total > 0 {
                            // Events seen but nothing credited; back off a
                            // little so retries do not align across devices
                            let jitter_ms = rand::thread_rng().gen_range(0..500u64);
                            tokio::time::sleep(std::time::Duration::from_millis(jitter_ms)).await;
                        }
                    }
                    _ = shutdown.changed() => {
                        debug!("claim loop shutting down");
                        break;
                    }
                }
            }
        });

        if let Ok(mut slot) = self.claim_handle.try_lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
        info!(interval_secs = self.config.claim_interval.as_secs(), "claim loop started");
    }
}
