//! Authentication errors.

use agentforce_core::{BrokerError, ConsentError, StoreError};
use thiserror::Error;

/// Authentication error.
///
/// Fatal for the current acquisition; a fresh call starts over.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication cancelled")]
    Cancelled,
    #[error("Authorization failed: {0}")]
    Provider(String),
    #[error("OAuth state mismatch")]
    StateMismatch,
    #[error("Token exchange failed: {0}")]
    Exchange(#[source] BrokerError),
    #[error(transparent)]
    Consent(#[from] ConsentError),
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
    #[error("Invalid authorization URL: {0}")]
    InvalidUrl(String),
}

impl AuthError {
    /// Whether the user closed or abandoned the consent flow.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
