//! Seams between the lifecycle core and its collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Credential, OutboundMessage, TokenResponse};

/// Credential store error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store error: {0}")]
    Internal(String),
}

/// Persists the bearer credential and the pending OAuth `state`.
///
/// Each store is bound to one namespace; two widgets sharing a namespace
/// share a credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Namespace this store reads and writes.
    fn namespace(&self) -> &str;

    /// Load the persisted credential, expired or not.
    async fn load(&self) -> Result<Option<Credential>, StoreError>;

    /// Replace the persisted credential.
    async fn save(&self, credential: &Credential) -> Result<(), StoreError>;

    /// Remove the credential and any pending state.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Persist the anti-CSRF state of a pending authorization.
    async fn save_state(&self, state: &str) -> Result<(), StoreError>;

    /// Remove and return the pending state. A state can be taken once.
    async fn take_state(&self) -> Result<Option<String>, StoreError>;
}

/// Credential broker error.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Broker returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Invalid broker response: {0}")]
    Decode(String),
}

/// Trusted backend that holds the client secret and talks to the
/// identity provider on the widget's behalf.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    /// Machine-to-machine token.
    async fn client_credentials(&self) -> Result<TokenResponse, BrokerError>;

    /// Exchange an authorization code for a token.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, BrokerError>;
}

/// Receives outbound messages for the hosting frame.
///
/// Delivery is fire-and-forget: implementations must not block and must
/// not fail loudly.
pub trait HostFrame: Send + Sync {
    /// Deliver a message.
    fn post(&self, message: OutboundMessage);

    /// Whether a hosting frame is attached at all.
    fn is_embedded(&self) -> bool {
        true
    }
}

/// Consent UI error.
#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("Consent window could not be opened: {0}")]
    Unavailable(String),
}

/// Message posted back by the OAuth callback page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentCallback {
    /// Origin the callback was posted from.
    pub origin: String,
    pub payload: CallbackPayload,
}

/// Callback outcome.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackPayload {
    /// The callback page already exchanged the code.
    OauthSuccess {
        #[serde(flatten)]
        token: TokenResponse,
    },
    /// Raw authorization code, still to be exchanged.
    OauthCode { code: String, state: String },
    /// The provider refused or the user declined.
    OauthError { error: String },
}

impl std::fmt::Debug for CallbackPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OauthSuccess { token } => f
                .debug_struct("OauthSuccess")
                .field("token", token)
                .finish(),
            Self::OauthCode { .. } => f.write_str("OauthCode { .. }"),
            Self::OauthError { error } => {
                f.debug_struct("OauthError").field("error", error).finish()
            }
        }
    }
}

/// An open secondary context showing the consent page.
#[async_trait]
pub trait ConsentWindow: Send {
    /// Next callback message, or `None` once no more can arrive.
    ///
    /// Must be cancel-safe: it is raced against the close poll.
    async fn recv(&mut self) -> Option<ConsentCallback>;

    /// Polled: whether the user closed the context.
    fn is_closed(&self) -> bool;

    /// Close the context.
    fn close(&mut self);
}

/// Opens consent contexts.
///
/// The framework runs the protocol; the embedding application decides
/// how the page is shown.
#[async_trait]
pub trait ConsentLauncher: Send + Sync {
    /// Open the consent page at `url`.
    async fn open(&self, url: &str) -> Result<Box<dyn ConsentWindow>, ConsentError>;
}
