//! Wallet event kinds, builders and parsers
//!
//! Three event shapes cross the relay boundary:
//! - kind 37375: replaceable plaintext wallet metadata (`d` = "wallet");
//!   the balance is deliberately public, proofs never are
//! - kind 37376: replaceable encrypted proof backup, one per mint
//!   (`d` = hash-derived mint identifier), content NIP-44 self-encrypted
//! - kind 9321: a nutzap, an unclaimed token addressed to a recipient

use nostr::{Event, EventBuilder, Filter, Kind, PublicKey, Tag, TagKind, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::wallet::types::{default_unit, normalize_mint_url, Proof};

/// Replaceable wallet metadata (name, public balance, mint)
pub const KIND_WALLET_INFO: u16 = 37375;
/// Replaceable encrypted proof backup, keyed by mint identifier
pub const KIND_TOKEN_BACKUP: u16 = 37376;
/// Incoming payment event carrying a redeemable token
pub const KIND_NUTZAP: u16 = 9321;

const WALLET_INFO_IDENTIFIER: &str = "wallet";

/// Stable identifier for a mint, used as the backup `d` tag so each
/// (pubkey, mint) pair has at most one live backup record on a relay
pub fn mint_identifier(mint_url: &str) -> String {
    let normalized = normalize_mint_url(mint_url);
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(&digest[..8])
}

// =============================================================================
// Wallet info (kind 37375)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfoPayload {
    pub name: String,
    pub balance: u64,
    pub mint: String,
}

pub fn build_wallet_info(name: &str, balance: u64, mint_url: &str) -> EventBuilder {
    let payload = WalletInfoPayload {
        name: name.to_string(),
        balance,
        mint: normalize_mint_url(mint_url),
    };
    // Payload fields are plain strings/ints; serialization cannot fail
    let content = serde_json::to_string(&payload).unwrap_or_default();
    EventBuilder::new(Kind::from(KIND_WALLET_INFO), content)
        .tags(vec![Tag::identifier(WALLET_INFO_IDENTIFIER)])
}

// =============================================================================
// Token backup (kind 37376)
// =============================================================================

/// Decrypted content of a backup record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBackupPayload {
    pub mint: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub proofs: Vec<Proof>,
}

impl TokenBackupPayload {
    pub fn new(mint_url: &str, proofs: Vec<Proof>) -> Self {
        Self {
            mint: normalize_mint_url(mint_url),
            unit: default_unit(),
            proofs,
        }
    }

    pub fn balance(&self) -> u64 {
        self.proofs.iter().fold(0u64, |acc, p| acc.saturating_add(p.amount))
    }
}

/// Build a backup event from already-encrypted content
pub fn build_token_backup(encrypted_content: String, mint_url: &str) -> EventBuilder {
    EventBuilder::new(Kind::from(KIND_TOKEN_BACKUP), encrypted_content).tags(vec![
        Tag::identifier(mint_identifier(mint_url)),
        Tag::custom(TagKind::custom("mint"), [normalize_mint_url(mint_url)]),
    ])
}

/// Filter matching all of a user's backup records
pub fn backup_filter(author: PublicKey) -> Filter {
    Filter::new().author(author).kind(Kind::from(KIND_TOKEN_BACKUP))
}

// =============================================================================
// Nutzaps (kind 9321)
// =============================================================================

/// A parsed incoming payment event
#[derive(Debug, Clone)]
pub struct IncomingNutzap {
    pub event_id: String,
    pub sender: PublicKey,
    /// Amount the sender claims; the redeemed amount is what actually counts
    pub amount: u64,
    /// Encoded cashu token embedded in the event
    pub token: String,
    pub mint_url: Option<String>,
}

pub fn build_nutzap(recipient: PublicKey, amount: u64, mint_url: &str, token: &str, memo: Option<&str>) -> EventBuilder {
    let mut tags = vec![
        Tag::public_key(recipient),
        Tag::custom(TagKind::custom("amount"), [amount.to_string()]),
        Tag::custom(TagKind::custom("u"), [normalize_mint_url(mint_url)]),
    ];
    if let Some(memo) = memo {
        if !memo.is_empty() {
            tags.push(Tag::custom(TagKind::custom("memo"), [memo]));
        }
    }
    EventBuilder::new(Kind::from(KIND_NUTZAP), token).tags(tags)
}

/// Filter for nutzaps addressed to `recipient` since `since` (unix seconds)
pub fn nutzap_filter(recipient: PublicKey, since: u64) -> Filter {
    Filter::new()
        .kind(Kind::from(KIND_NUTZAP))
        .pubkey(recipient)
        .since(Timestamp::from(since))
}

/// Parse a nutzap event; `None` when the event does not carry a token.
///
/// A missing or unparseable amount tag parses as zero, which the claim loop
/// skips rather than treating as an error.
pub fn parse_nutzap(event: &Event) -> Option<IncomingNutzap> {
    if event.kind != Kind::from(KIND_NUTZAP) {
        return None;
    }
    let token = event.content.trim();
    if token.is_empty() {
        return None;
    }

    let mut amount = 0u64;
    let mut mint_url = None;
    for tag in event.tags.iter() {
        let slice = tag.as_slice();
        match slice.first().map(|s| s.as_str()) {
            Some("amount") => {
                amount = slice.get(1).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
            }
            Some("u") => {
                mint_url = slice.get(1).map(|v| normalize_mint_url(v));
            }
            _ => {}
        }
    }

    Some(IncomingNutzap {
        event_id: event.id.to_hex(),
        sender: event.pubkey,
        amount,
        token: token.to_string(),
        mint_url,
    })
}
