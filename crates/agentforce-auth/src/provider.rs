//! Bearer token acquisition.

use std::{sync::Arc, time::Duration};

use agentforce_core::{
    Credential, CredentialBroker, CredentialStore, EventReporter, TokenResponse,
    config::DEFAULT_TOKEN_TTL,
};
use tokio::sync::Mutex;

use crate::{AuthError, InteractiveFlow};

/// Obtains a valid bearer credential.
///
/// Order of preference: the credential already held, the persisted one,
/// a machine-to-machine token from the broker, and finally the
/// interactive flow. Acquisitions are serialized, so concurrent callers
/// wait for the one in flight and then hit the cache.
pub struct TokenProvider {
    store: Arc<dyn CredentialStore>,
    broker: Arc<dyn CredentialBroker>,
    interactive: InteractiveFlow,
    reporter: EventReporter,
    ttl: Duration,
    current: Mutex<Option<Credential>>,
}

impl TokenProvider {
    /// Create a provider.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        broker: Arc<dyn CredentialBroker>,
        interactive: InteractiveFlow,
        reporter: EventReporter,
    ) -> Self {
        Self {
            store,
            broker,
            interactive,
            reporter,
            ttl: DEFAULT_TOKEN_TTL,
            current: Mutex::new(None),
        }
    }

    /// Lifetime given to newly acquired credentials.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Return a valid credential, acquiring one if needed.
    ///
    /// # Errors
    /// Returns `AuthError` when both strategies fail. The failure has
    /// already been reported through the `EventReporter`.
    pub async fn acquire(&self) -> Result<Credential, AuthError> {
        self.acquire_for_session(None).await
    }

    /// Like [`TokenProvider::acquire`], attributing a failure report to
    /// `session_id`.
    ///
    /// # Errors
    /// Same as [`TokenProvider::acquire`].
    pub async fn acquire_for_session(
        &self,
        session_id: Option<&str>,
    ) -> Result<Credential, AuthError> {
        let mut current = self.current.lock().await;

        if let Some(credential) = current.as_ref().filter(|c| c.is_valid()) {
            return Ok(credential.clone());
        }

        match self.store.load().await {
            Ok(Some(credential)) if credential.is_valid() => {
                tracing::debug!("using stored access token");
                *current = Some(credential.clone());
                return Ok(credential);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("failed to read stored credential: {e}"),
        }

        tracing::info!("starting authentication");
        match self.fetch().await {
            Ok(token) => {
                let credential = Credential::issued_now(token.access_token, self.ttl);
                if let Err(e) = self.store.save(&credential).await {
                    tracing::warn!("failed to persist credential: {e}");
                }
                *current = Some(credential.clone());
                tracing::info!("authentication successful");
                Ok(credential)
            }
            Err(e) => {
                *current = None;
                self.reporter
                    .report_error("Authentication failed", &e, session_id);
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<TokenResponse, AuthError> {
        match self.broker.client_credentials().await {
            Ok(token) => Ok(token),
            Err(e) => {
                tracing::info!(
                    "client credentials flow failed, falling back to interactive flow: {e}"
                );
                self.interactive.run().await
            }
        }
    }

    /// Credential currently held, valid or not, without any I/O.
    pub async fn current(&self) -> Option<Credential> {
        self.current.lock().await.clone()
    }

    /// Whether a valid credential is held.
    pub async fn is_authenticated(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(Credential::is_valid)
    }

    /// Forget the credential here and in the store.
    pub async fn clear(&self) {
        let mut current = self.current.lock().await;
        *current = None;
        if let Err(e) = self.store.clear().await {
            tracing::warn!("failed to clear credential store: {e}");
        }
    }
}
