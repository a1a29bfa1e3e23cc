//! Signer error types
//!
//! Failure modes of the two credential backends, kept distinct because each
//! warrants a different retry and user-messaging policy: a decline is not a
//! timeout, and a permanent block must never be retried.

use std::fmt;
use std::time::Duration;

/// Errors from the external signer authority, before timeout wrapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    /// The user rejected this specific request
    Declined,
    /// The signer app could not be reached (not installed, not running)
    Unreachable(String),
    /// The authority permanently rejected this app; terminal for the session
    Blocked,
    /// The authority answered with something unparseable
    Malformed(String),
}

impl fmt::Display for AuthorityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declined => write!(f, "Request declined by user"),
            Self::Unreachable(msg) => write!(f, "Signer app unreachable: {}", msg),
            Self::Blocked => write!(f, "This app is blocked in the signer"),
            Self::Malformed(msg) => write!(f, "Malformed signer response: {}", msg),
        }
    }
}

impl std::error::Error for AuthorityError {}

/// Signer error type
#[derive(Debug)]
pub enum SignerError {
    /// No credential is present for this session
    NoCredential,
    /// Stored credential could not be parsed
    InvalidCredential(String),
    /// User declined the signing request
    Declined,
    /// Signer authority unreachable
    Unreachable(String),
    /// Round trip exceeded its hard bound
    TimedOut { operation: &'static str, after: Duration },
    /// Authority permanently rejected this app; do not retry this session
    Blocked,
    /// Authority response failed validation
    Malformed(String),
    /// Local cryptographic operation failed
    Crypto(String),
    /// Persisted signer state could not be read or written
    Storage(String),
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredential => write!(f, "No credential available"),
            Self::InvalidCredential(msg) => write!(f, "Invalid credential: {}", msg),
            Self::Declined => write!(f, "Signing request declined"),
            Self::Unreachable(msg) => write!(f, "Signer unreachable: {}", msg),
            Self::TimedOut { operation, after } => {
                write!(f, "Signer {} timed out after {}s", operation, after.as_secs())
            }
            Self::Blocked => write!(f, "App permanently blocked by signer"),
            Self::Malformed(msg) => write!(f, "Malformed signer response: {}", msg),
            Self::Crypto(msg) => write!(f, "Cryptographic operation failed: {}", msg),
            Self::Storage(msg) => write!(f, "Signer state storage failed: {}", msg),
        }
    }
}

impl std::error::Error for SignerError {}

impl SignerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Terminal failures must not be retried within this session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Blocked)
    }

    /// Actionable message for the UI layer; remediation differs per variant
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoCredential | Self::InvalidCredential(_) => "Log in again to continue",
            Self::Declined => "Request was declined. Approve it in your signer app to continue",
            Self::Unreachable(_) => "Signer app not found. Install or open your signer app",
            Self::TimedOut { .. } => "Signer did not respond. Open your signer app and try again",
            Self::Blocked => "This app was blocked in your signer. Re-approve it there",
            Self::Malformed(_) | Self::Crypto(_) | Self::Storage(_) => {
                "Something went wrong with the signer. Try again"
            }
        }
    }
}

impl From<AuthorityError> for SignerError {
    fn from(err: AuthorityError) -> Self {
        match err {
            AuthorityError::Declined => Self::Declined,
            AuthorityError::Unreachable(msg) => Self::Unreachable(msg),
            AuthorityError::Blocked => Self::Blocked,
            AuthorityError::Malformed(msg) => Self::Malformed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_is_terminal_declined_is_not() {
        assert!(SignerError::Blocked.is_terminal());
        assert!(!SignerError::Declined.is_terminal());
    }

    #[test]
    fn variants_carry_distinct_user_messages() {
        let declined = SignerError::Declined.user_message();
        let unreachable = SignerError::Unreachable("no app".into()).user_message();
        let timed_out = SignerError::TimedOut {
            operation: "sign",
            after: Duration::from_secs(60),
        }
        .user_message();
        assert_ne!(declined, unreachable);
        assert_ne!(unreachable, timed_out);
    }
}
