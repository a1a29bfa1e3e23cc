//! Relay restore path
//!
//! New-device bootstrap: fetch every backup record the user ever published,
//! decrypt what we can, and union the proofs. Divergent relays may hold
//! records that were never superseded everywhere, so all decryptable records
//! count, not just the newest. Proofs resurrected from stale records are
//! harmless: the mint rejects their secrets on the next redemption attempt.

use std::collections::HashMap;

use nostr::PublicKey;
use tracing::{debug, info, warn};

use crate::wallet::proofs::merge_proofs;
use crate::wallet::types::Proof;

use super::events::{backup_filter, TokenBackupPayload};

/// What a successful restore recovered
#[derive(Debug, Clone)]
pub struct RestoredWallet {
    /// Mint with the highest aggregate balance among the decrypted records
    pub mint_url: String,
    /// Union of all decryptable proofs for that mint, deduped by secret
    pub proofs: Vec<Proof>,
}

impl super::WalletSync {
    /// Reconstruct wallet state from relay backups.
    ///
    /// Returns `None` when no decryptable record exists. A fetch timeout
    /// reads the same way: no data.
    pub async fn restore_proofs_from_nostr(&self, pubkey: PublicKey) -> Option<RestoredWallet> {
        let signer = self.signer_if_available().await?;

        let events = match self
            .relay
            .fetch(backup_filter(pubkey), self.config.relay_fetch_timeout)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                debug!("backup fetch failed, treating as no data: {}", e);
                return None;
            }
        };

        if events.is_empty() {
            debug!("no backup records found on relays");
            return None;
        }
        info!(records = events.len(), "decrypting backup records");

        // Union per mint; any single undecryptable or malformed record is
        // skipped, never fatal to the restore
        let mut per_mint: HashMap<String, Vec<Proof>> = HashMap::new();
        for event in &events {
            let decrypted = match signer.nip44_self_decrypt(&event.content).await {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    warn!(event_id = %event.id, "skipping undecryptable backup record: {}", e);
                    continue;
                }
            };
            let payload: TokenBackupPayload = match serde_json::from_str(&decrypted) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(event_id = %event.id, "skipping malformed backup record: {}", e);
                    continue;
                }
            };

            let held = per_mint.entry(payload.mint.clone()).or_default();
            let (merged, _) = merge_proofs(held, payload.proofs);
            *held = merged;
        }

        // Primary mint is the one holding the most value
        let (mint_url, proofs) = per_mint
            .into_iter()
            .max_by_key(|(_, proofs)| proofs.iter().fold(0u64, |acc, p| acc.saturating_add(p.amount)))?;

        let balance: u64 = proofs.iter().fold(0u64, |acc, p| acc.saturating_add(p.amount));
        info!(balance, mint = %mint_url, proofs = proofs.len(), "restored wallet from relay backups");
        Some(RestoredWallet { mint_url, proofs })
    }
}
