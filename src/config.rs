//! Wallet configuration
//!
//! Timeouts, intervals and relay lists with production defaults. Everything
//! network-facing is time-boxed; these are the bounds.

use std::time::Duration;

use serde::Deserialize;

use crate::relay::DEFAULT_RELAYS;

/// Configuration for the wallet subsystem.
///
/// `Deserialize` so hosts can load it from their settings storage; `Default`
/// gives the recommended production values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Relays used for backup, wallet-info and nutzap traffic
    pub relays: Vec<String>,

    /// Hard bound on a remote-signer signing round trip
    #[serde(with = "duration_secs")]
    pub sign_timeout: Duration,
    /// Hard bound on remote-signer encrypt/decrypt helpers
    #[serde(with = "duration_secs")]
    pub crypto_timeout: Duration,
    /// How long sync init waits for a signer before degrading to receive-only
    #[serde(with = "duration_secs")]
    pub signer_resolve_timeout: Duration,
    /// Bound on relay fetches used on hot paths (restore, claim loop)
    #[serde(with = "duration_secs")]
    pub relay_fetch_timeout: Duration,

    /// Claim loop period
    #[serde(with = "duration_secs")]
    pub claim_interval: Duration,
    /// How far back the claim loop looks for unclaimed nutzaps
    #[serde(with = "duration_secs")]
    pub claim_lookback: Duration,

    /// How many background task outcomes to keep for observability
    pub task_log_capacity: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect(),
            sign_timeout: Duration::from_secs(60),
            crypto_timeout: Duration::from_secs(15),
            signer_resolve_timeout: Duration::from_secs(10),
            relay_fetch_timeout: Duration::from_secs(10),
            claim_interval: Duration::from_secs(30),
            claim_lookback: Duration::from_secs(7 * 24 * 60 * 60),
            task_log_capacity: 32,
        }
    }
}

/// Serde helper: durations as plain seconds in config files
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recommended_bounds() {
        let config = WalletConfig::default();
        assert_eq!(config.sign_timeout, Duration::from_secs(60));
        assert_eq!(config.crypto_timeout, Duration::from_secs(15));
        assert_eq!(config.claim_interval, Duration::from_secs(30));
        assert_eq!(config.claim_lookback, Duration::from_secs(604_800));
        assert!(!config.relays.is_empty());
    }

    #[test]
    fn deserializes_durations_from_seconds() {
        let config: WalletConfig =
            serde_json::from_str(r#"{"sign_timeout": 5, "relays": ["wss://r.example.com"]}"#).unwrap();
        assert_eq!(config.sign_timeout, Duration::from_secs(5));
        assert_eq!(config.relays, vec!["wss://r.example.com".to_string()]);
        // untouched fields keep their defaults
        assert_eq!(config.claim_interval, Duration::from_secs(30));
    }
}
