//! Cashu token encoding
//!
//! Serializes proofs to the V3 token format: `cashuA` prefix followed by
//! URL-safe base64 of `{"token":[{"mint":..,"proofs":[..]}],"unit":..,"memo":..}`.
//! Decoding tolerates both padded and unpadded base64, since tokens in the
//! wild carry both.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::errors::{WalletError, WalletResult};
use super::types::{default_unit, normalize_mint_url, Proof};

const TOKEN_PREFIX: &str = "cashuA";

/// One mint's entry inside a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub mint: String,
    pub proofs: Vec<Proof>,
}

/// A redeemable cashu token: proofs grouped by mint plus unit and memo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub token: Vec<TokenEntry>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl Token {
    pub fn new(mint_url: impl Into<String>, proofs: Vec<Proof>, memo: Option<String>) -> Self {
        Self {
            token: vec![TokenEntry {
                mint: normalize_mint_url(mint_url),
                proofs,
            }],
            unit: default_unit(),
            memo,
        }
    }

    /// Total amount across all entries
    pub fn amount(&self) -> u64 {
        self.token
            .iter()
            .flat_map(|entry| entry.proofs.iter())
            .fold(0u64, |acc, p| acc.saturating_add(p.amount))
    }

    /// Mint URL of the first entry; tokens this wallet builds have exactly one
    pub fn mint_url(&self) -> Option<&str> {
        self.token.first().map(|entry| entry.mint.as_str())
    }

    /// All proofs across entries
    pub fn proofs(&self) -> Vec<Proof> {
        self.token.iter().flat_map(|entry| entry.proofs.clone()).collect()
    }

    /// Encode to the `cashuA...` wire string
    pub fn encode(&self) -> WalletResult<String> {
        let json = serde_json::to_string(self)
            .map_err(|e| WalletError::Internal(format!("token serialization failed: {}", e)))?;
        Ok(format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(json.as_bytes())))
    }

    /// Decode a `cashuA...` wire string
    pub fn decode(raw: &str) -> WalletResult<Self> {
        let raw = raw.trim();
        let payload = raw.strip_prefix(TOKEN_PREFIX).ok_or_else(|| WalletError::InvalidToken {
            reason: "missing cashuA prefix".to_string(),
        })?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .or_else(|_| URL_SAFE.decode(payload))
            .map_err(|e| WalletError::InvalidToken {
                reason: format!("base64 decode failed: {}", e),
            })?;

        let token: Token = serde_json::from_slice(&bytes).map_err(|e| WalletError::InvalidToken {
            reason: format!("token JSON parse failed: {}", e),
        })?;

        if token.token.is_empty() {
            return Err(WalletError::InvalidToken {
                reason: "token has no mint entries".to_string(),
            });
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof(amount: u64, secret: &str) -> Proof {
        Proof::new("ks1", amount, secret, format!("C-{}", secret))
    }

    #[test]
    fn encode_decode_preserves_proofs_and_memo() {
        let token = Token::new(
            "https://mint.example.com",
            vec![proof(100, "a"), proof(400, "b")],
            Some("good run".to_string()),
        );
        let encoded = token.encode().unwrap();
        assert!(encoded.starts_with("cashuA"));

        let decoded = Token::decode(&encoded).unwrap();
        assert_eq!(decoded.amount(), 500);
        assert_eq!(decoded.memo.as_deref(), Some("good run"));
        assert_eq!(decoded.mint_url(), Some("https://mint.example.com"));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            Token::decode("lnbc100n1..."),
            Err(WalletError::InvalidToken { .. })
        ));
        assert!(matches!(
            Token::decode("cashuA%%%"),
            Err(WalletError::InvalidToken { .. })
        ));
    }

    #[test]
    fn decode_accepts_padded_base64() {
        let token = Token::new("https://mint.example.com", vec![proof(1, "x")], None);
        let encoded = token.encode().unwrap();
        // Re-pad the payload the way some encoders do
        let payload = encoded.strip_prefix("cashuA").unwrap();
        let padded = format!("cashuA{}{}", payload, "=".repeat((4 - payload.len() % 4) % 4));
        assert_eq!(Token::decode(&padded).unwrap().amount(), 1);
    }
}
