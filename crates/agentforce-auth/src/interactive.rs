//! Interactive authorization-code flow.
//!
//! Opens the provider's consent page in a secondary context and resolves
//! exactly once: with a token, with the provider's error, or with
//! `AuthError::Cancelled` when the context is closed without an answer.

use std::{sync::Arc, time::Duration};

use agentforce_core::{
    AuthConfig, CallbackPayload, ConsentLauncher, ConsentWindow, CredentialBroker,
    CredentialStore, TokenResponse, config::DEFAULT_SCOPE,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::Url;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::AuthError;

/// How often the consent context is checked for having been closed.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Interactive authorization-code flow.
pub struct InteractiveFlow {
    auth: Arc<AuthConfig>,
    store: Arc<dyn CredentialStore>,
    broker: Arc<dyn CredentialBroker>,
    launcher: Arc<dyn ConsentLauncher>,
    poll_interval: Duration,
    expected_origin: Option<String>,
}

impl InteractiveFlow {
    /// Create a flow.
    ///
    /// Callbacks are accepted only from the origin of the configured
    /// redirect URI. A redirect URI without a usable origin makes every
    /// run fail before the consent context is opened.
    #[must_use]
    pub fn new(
        auth: Arc<AuthConfig>,
        store: Arc<dyn CredentialStore>,
        broker: Arc<dyn CredentialBroker>,
        launcher: Arc<dyn ConsentLauncher>,
    ) -> Self {
        let expected_origin = Url::parse(&auth.redirect_uri)
            .ok()
            .map(|url| url.origin())
            .filter(|origin| origin.is_tuple())
            .map(|origin| origin.ascii_serialization());
        Self {
            auth,
            store,
            broker,
            launcher,
            poll_interval: DEFAULT_POLL_INTERVAL,
            expected_origin,
        }
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Fresh anti-CSRF state value.
    #[must_use]
    pub fn generate_state() -> String {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Consent page URL for `state`.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidUrl` if the instance URL does not parse.
    pub fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
        Url::parse_with_params(
            &self.auth.authorize_endpoint(),
            &[
                ("response_type", "code"),
                ("client_id", self.auth.client_id.as_str()),
                ("redirect_uri", self.auth.redirect_uri.as_str()),
                ("state", state),
                ("scope", DEFAULT_SCOPE),
            ],
        )
        .map(String::from)
        .map_err(|e| AuthError::InvalidUrl(e.to_string()))
    }

    /// Run the flow to completion.
    ///
    /// # Errors
    /// Returns `Cancelled` if the consent context closes first, `Provider`
    /// for an explicit error callback, `StateMismatch` for a code whose
    /// state does not match the persisted one, `InvalidUrl` when the
    /// redirect URI has no origin to check callbacks against.
    pub async fn run(&self) -> Result<TokenResponse, AuthError> {
        if self.expected_origin.is_none() {
            return Err(AuthError::InvalidUrl(format!(
                "redirect URI {:?} has no origin",
                self.auth.redirect_uri
            )));
        }
        let state = Self::generate_state();
        self.store.save_state(&state).await?;

        let result = self.run_with_state(&state).await;

        if let Err(e) = self.store.take_state().await {
            tracing::warn!("failed to discard OAuth state: {e}");
        }
        result
    }

    async fn run_with_state(&self, state: &str) -> Result<TokenResponse, AuthError> {
        let url = self.authorization_url(state)?;
        tracing::info!("opening consent window");
        let mut window = self.launcher.open(&url).await?;

        let outcome = self.await_callback(window.as_mut()).await;
        window.close();

        match outcome? {
            CallbackPayload::OauthSuccess { token } => {
                tracing::info!("interactive authorization succeeded");
                Ok(token)
            }
            CallbackPayload::OauthCode {
                code,
                state: returned,
            } => {
                let stored = self.store.take_state().await?;
                if returned != state || stored.as_deref() != Some(state) {
                    return Err(AuthError::StateMismatch);
                }
                self.broker
                    .exchange_code(&code)
                    .await
                    .map_err(AuthError::Exchange)
            }
            CallbackPayload::OauthError { error } => Err(AuthError::Provider(error)),
        }
    }

    async fn await_callback(
        &self,
        window: &mut dyn ConsentWindow,
    ) -> Result<CallbackPayload, AuthError> {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.tick().await;

        loop {
            tokio::select! {
                msg = window.recv() => match msg {
                    Some(callback) if self.accepts(&callback.origin) => return Ok(callback.payload),
                    Some(callback) => {
                        tracing::debug!(origin = %callback.origin, "ignoring callback from foreign origin");
                    }
                    None => return Err(AuthError::Cancelled),
                },
                _ = poll.tick() => {
                    if window.is_closed() {
                        tracing::info!("consent window closed without completing");
                        return Err(AuthError::Cancelled);
                    }
                }
            }
        }
    }

    fn accepts(&self, origin: &str) -> bool {
        self.expected_origin.as_deref() == Some(origin)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use agentforce_core::{BrokerError, ConsentCallback, ConsentError};
    use async_trait::async_trait;
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };
    use tokio::sync::mpsc;

    pub const ORIGIN: &str = "https://widget.example.com";

    /// Scripted consent UI.
    pub struct ScriptedLauncher {
        pub opened: AtomicUsize,
        pub urls: Mutex<Vec<String>>,
        script: Mutex<Option<Script>>,
    }

    pub enum Script {
        /// Deliver these callbacks, then stay open.
        Callbacks(Vec<ConsentCallback>),
        /// Never answer; report closed from the first poll on.
        ClosedSilently,
    }

    impl ScriptedLauncher {
        pub fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                opened: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
                script: Mutex::new(Some(script)),
            })
        }
    }

    struct ScriptedWindow {
        rx: mpsc::UnboundedReceiver<ConsentCallback>,
        // Keeps the channel open so `recv` pends.
        _tx: mpsc::UnboundedSender<ConsentCallback>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ConsentWindow for ScriptedWindow {
        async fn recv(&mut self) -> Option<ConsentCallback> {
            self.rx.recv().await
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ConsentLauncher for ScriptedLauncher {
        async fn open(&self, url: &str) -> Result<Box<dyn ConsentWindow>, ConsentError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            let script = self
                .script
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| ConsentError::Unavailable("script exhausted".to_string()))?;

            let (tx, rx) = mpsc::unbounded_channel();
            let closed = Arc::new(AtomicBool::new(false));
            match script {
                Script::Callbacks(callbacks) => {
                    for cb in callbacks {
                        tx.send(cb).unwrap();
                    }
                }
                Script::ClosedSilently => closed.store(true, Ordering::SeqCst),
            }
            Ok(Box::new(ScriptedWindow {
                rx,
                _tx: tx,
                closed,
            }))
        }
    }

    pub fn callback(origin: &str, payload: CallbackPayload) -> ConsentCallback {
        ConsentCallback {
            origin: origin.to_string(),
            payload,
        }
    }

    /// Broker whose code exchange echoes the code back as the token.
    struct EchoBroker;

    #[async_trait]
    impl CredentialBroker for EchoBroker {
        async fn client_credentials(&self) -> Result<TokenResponse, BrokerError> {
            Err(BrokerError::Status {
                status: 500,
                message: "disabled".to_string(),
            })
        }

        async fn exchange_code(&self, code: &str) -> Result<TokenResponse, BrokerError> {
            Ok(TokenResponse::bearer(format!("exchanged-{code}")))
        }
    }

    pub fn auth() -> Arc<AuthConfig> {
        Arc::new(AuthConfig::new(
            "https://org.my.salesforce.com",
            "X",
            format!("{ORIGIN}/oauth-callback.html"),
            "A1",
        ))
    }

    fn flow(launcher: Arc<ScriptedLauncher>, store: Arc<MemoryCredentialStore>) -> InteractiveFlow {
        InteractiveFlow::new(auth(), store, Arc::new(EchoBroker), launcher)
            .with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_authorization_url_params() {
        let launcher = ScriptedLauncher::new(Script::ClosedSilently);
        let flow = flow(launcher, Arc::new(MemoryCredentialStore::default()));
        let url = Url::parse(&flow.authorization_url("st4te").unwrap()).unwrap();

        assert_eq!(url.path(), "/services/oauth2/authorize");
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(params.contains(&("response_type".into(), "code".into())));
        assert!(params.contains(&("client_id".into(), "X".into())));
        assert!(params.contains(&("state".into(), "st4te".into())));
        assert!(params.contains(&("scope".into(), "api refresh_token".into())));
        assert!(params.contains(&(
            "redirect_uri".into(),
            format!("{ORIGIN}/oauth-callback.html")
        )));
    }

    #[test]
    fn test_states_are_fresh() {
        let a = InteractiveFlow::generate_state();
        let b = InteractiveFlow::generate_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }

    #[tokio::test]
    async fn test_success_callback_resolves_with_token() {
        let launcher = ScriptedLauncher::new(Script::Callbacks(vec![callback(
            ORIGIN,
            CallbackPayload::OauthSuccess {
                token: TokenResponse::bearer("tok-ui"),
            },
        )]));
        let store = Arc::new(MemoryCredentialStore::default());
        let token = flow(launcher.clone(), store.clone()).run().await.unwrap();

        assert_eq!(token.access_token, "tok-ui");
        assert_eq!(launcher.opened.load(Ordering::SeqCst), 1);
        assert!(store.take_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_foreign_origin_is_ignored() {
        let launcher = ScriptedLauncher::new(Script::Callbacks(vec![
            callback(
                "https://evil.example.com",
                CallbackPayload::OauthSuccess {
                    token: TokenResponse::bearer("forged"),
                },
            ),
            callback(
                ORIGIN,
                CallbackPayload::OauthSuccess {
                    token: TokenResponse::bearer("genuine"),
                },
            ),
        ]));
        let token = flow(launcher, Arc::new(MemoryCredentialStore::default()))
            .run()
            .await
            .unwrap();
        assert_eq!(token.access_token, "genuine");
    }

    #[tokio::test]
    async fn test_redirect_without_origin_fails_closed() {
        for redirect in ["", "/oauth-callback.html", "data:text/plain,cb"] {
            let launcher = ScriptedLauncher::new(Script::Callbacks(vec![callback(
                "https://evil.example.com",
                CallbackPayload::OauthSuccess {
                    token: TokenResponse::bearer("forged"),
                },
            )]));
            let auth = Arc::new(AuthConfig::new(
                "https://org.my.salesforce.com",
                "X",
                redirect,
                "A1",
            ));
            let store = Arc::new(MemoryCredentialStore::default());
            let flow = InteractiveFlow::new(auth, store.clone(), Arc::new(EchoBroker), launcher.clone())
                .with_poll_interval(Duration::from_millis(10));

            let err = flow.run().await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidUrl(_)), "{redirect:?}: {err:?}");
            assert_eq!(launcher.opened.load(Ordering::SeqCst), 0);
            assert!(store.take_state().await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_error_callback_rejects_with_provider_error() {
        let launcher = ScriptedLauncher::new(Script::Callbacks(vec![callback(
            ORIGIN,
            CallbackPayload::OauthError {
                error: "access_denied".to_string(),
            },
        )]));
        let err = flow(launcher, Arc::new(MemoryCredentialStore::default()))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Provider(ref e) if e == "access_denied"));
    }

    #[tokio::test]
    async fn test_closed_window_cancels() {
        let launcher = ScriptedLauncher::new(Script::ClosedSilently);
        let err = flow(launcher, Arc::new(MemoryCredentialStore::default()))
            .run()
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_code_with_matching_state_is_exchanged() {
        let store = Arc::new(MemoryCredentialStore::default());
        let launcher = Arc::new(CodeEchoLauncher {
            store: store.clone(),
            tamper: false,
        });
        let flow = InteractiveFlow::new(auth(), store.clone(), Arc::new(EchoBroker), launcher)
            .with_poll_interval(Duration::from_millis(10));

        let token = flow.run().await.unwrap();
        assert_eq!(token.access_token, "exchanged-c-42");
        assert!(store.take_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_code_with_wrong_state_is_rejected() {
        let store = Arc::new(MemoryCredentialStore::default());
        let launcher = Arc::new(CodeEchoLauncher {
            store: store.clone(),
            tamper: true,
        });
        let flow = InteractiveFlow::new(auth(), store, Arc::new(EchoBroker), launcher)
            .with_poll_interval(Duration::from_millis(10));

        let err = flow.run().await.unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch));
    }

    /// Answers with a code carrying the state that was persisted before
    /// the window opened.
    struct CodeEchoLauncher {
        store: Arc<MemoryCredentialStore>,
        tamper: bool,
    }

    #[async_trait]
    impl ConsentLauncher for CodeEchoLauncher {
        async fn open(&self, url: &str) -> Result<Box<dyn ConsentWindow>, ConsentError> {
            let url = Url::parse(url).unwrap();
            let state = url
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap();
            // The state must already be persisted when the window opens.
            let persisted = self.store.take_state().await.unwrap().unwrap();
            assert_eq!(persisted, state);
            self.store.save_state(&persisted).await.unwrap();

            let state = if self.tamper {
                "forged".to_string()
            } else {
                state
            };
            let (tx, rx) = mpsc::unbounded_channel();
            tx.send(callback(
                ORIGIN,
                CallbackPayload::OauthCode {
                    code: "c-42".to_string(),
                    state,
                },
            ))
            .unwrap();
            Ok(Box::new(ScriptedWindow {
                rx,
                _tx: tx,
                closed: Arc::new(AtomicBool::new(false)),
            }))
        }
    }
}
