//! The chat widget facade.
//!
//! Wires the token provider, session manager and message channel to one
//! configuration snapshot and one hosting frame, and publishes visible
//! state changes to that frame.

use std::{
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};

use agentforce_auth::{AuthError, InteractiveFlow, TokenProvider, store::MemoryCredentialStore};
use agentforce_core::{
    AgentReply, ConfigError, ConsentLauncher, Credential, CredentialBroker, CredentialStore,
    DetachedFrame, EventReporter, HostFrame, InboundMessage, LifecycleState, OutboundMessage,
    WidgetConfig, WidgetState,
};
use serde_json::json;

use crate::{AgentApi, MessageChannel, MessageError, Session, SessionError, SessionManager};

/// Builder for [`ChatWidget`].
pub struct ChatWidgetBuilder {
    config: WidgetConfig,
    store: Option<Arc<dyn CredentialStore>>,
    broker: Option<Arc<dyn CredentialBroker>>,
    launcher: Option<Arc<dyn ConsentLauncher>>,
    frame: Option<Arc<dyn HostFrame>>,
    http: Option<reqwest::Client>,
    poll_interval: Option<Duration>,
}

impl ChatWidgetBuilder {
    /// Where credentials and OAuth state persist. Defaults to memory.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn broker(mut self, broker: Arc<dyn CredentialBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn ConsentLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Hosting frame. Without one the widget runs standalone.
    #[must_use]
    pub fn frame(mut self, frame: Arc<dyn HostFrame>) -> Self {
        self.frame = Some(frame);
        self
    }

    #[must_use]
    pub fn http(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// How often the interactive flow checks for a closed consent UI.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Validate the configuration and assemble the widget.
    ///
    /// # Errors
    /// Returns `ConfigError::Missing` for absent auth keys and
    /// `ConfigError::Invalid` when no broker or consent launcher is set.
    pub fn build(self) -> Result<ChatWidget, ConfigError> {
        self.config.auth.validate()?;
        let broker = self
            .broker
            .ok_or_else(|| ConfigError::Invalid("no credential broker configured".to_string()))?;
        let launcher = self
            .launcher
            .ok_or_else(|| ConfigError::Invalid("no consent launcher configured".to_string()))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::default()));
        let frame = self.frame.unwrap_or_else(|| Arc::new(DetachedFrame));
        let http = self.http.unwrap_or_default();

        let auth = Arc::new(self.config.auth.clone());
        let reporter = EventReporter::new(self.config.analytics.clone(), frame);

        let mut interactive = InteractiveFlow::new(auth.clone(), store.clone(), broker.clone(), launcher);
        if let Some(interval) = self.poll_interval {
            interactive = interactive.with_poll_interval(interval);
        }
        let tokens = Arc::new(
            TokenProvider::new(store, broker, interactive, reporter.clone())
                .with_ttl(self.config.chat.token_ttl),
        );

        let api = AgentApi::with_client(auth.agent_api_base.clone(), http);
        let sessions = Arc::new(SessionManager::new(
            api.clone(),
            tokens.clone(),
            auth,
            reporter.clone(),
        ));
        let channel = MessageChannel::new(api, sessions.clone(), reporter.clone());

        tracing::debug!(agent_id = %self.config.auth.agent_id, "chat widget assembled");
        Ok(ChatWidget {
            config: RwLock::new(Arc::new(self.config)),
            tokens,
            sessions,
            channel,
            reporter,
            state: Mutex::new(WidgetState {
                minimized: false,
                lifecycle: LifecycleState::Unauthenticated,
            }),
        })
    }
}

/// An embeddable chat client for one agent.
pub struct ChatWidget {
    config: RwLock<Arc<WidgetConfig>>,
    tokens: Arc<TokenProvider>,
    sessions: Arc<SessionManager>,
    channel: MessageChannel,
    reporter: EventReporter,
    state: Mutex<WidgetState>,
}

impl ChatWidget {
    #[must_use]
    pub const fn builder(config: WidgetConfig) -> ChatWidgetBuilder {
        ChatWidgetBuilder {
            config,
            store: None,
            broker: None,
            launcher: None,
            frame: None,
            http: None,
            poll_interval: None,
        }
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<WidgetConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn state(&self) -> WidgetState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.state().lifecycle
    }

    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    #[must_use]
    pub const fn tokens(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    #[must_use]
    pub const fn reporter(&self) -> &EventReporter {
        &self.reporter
    }

    /// Acquire a credential.
    ///
    /// # Errors
    /// Returns the `AuthError` of the failed acquisition. The lifecycle
    /// falls back to where it was.
    pub async fn authenticate(&self) -> Result<Credential, AuthError> {
        if !self.tokens.is_authenticated().await {
            self.set_lifecycle(LifecycleState::Authenticating);
        }
        let session_id = self.sessions.active().await.map(|s| s.id);
        let result = self.tokens.acquire_for_session(session_id.as_deref()).await;
        self.sync_lifecycle().await;
        result
    }

    /// Authenticate and open a fresh session.
    ///
    /// Returns the greeting to show: the session's own opening message,
    /// or the configured welcome message.
    ///
    /// # Errors
    /// Returns `SessionError` if authentication or creation failed.
    pub async fn connect(&self) -> Result<String, SessionError> {
        self.authenticate().await?;
        let result = self.sessions.start().await;
        self.sync_lifecycle().await;
        let session = result?;
        Ok(self.greeting(&session))
    }

    fn greeting(&self, session: &Session) -> String {
        session
            .opening
            .last_message()
            .map_or_else(|| self.config().theme.welcome_message.clone(), str::to_string)
    }

    /// Send a user message to the active session.
    ///
    /// Leading and trailing whitespace is trimmed first.
    ///
    /// # Errors
    /// Returns `MessageError::InvalidInput` for empty or overlong input,
    /// and the channel's error otherwise.
    pub async fn send(&self, text: &str) -> Result<AgentReply, MessageError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MessageError::InvalidInput("message is empty".to_string()));
        }
        let limit = self.config().chat.max_message_length;
        let length = text.chars().count();
        if length > limit {
            return Err(MessageError::InvalidInput(format!(
                "message is {length} characters, the limit is {limit}"
            )));
        }

        let result = self.channel.send(text, None).await;
        self.sync_lifecycle().await;
        let reply = result?;

        if let Some(session) = self.sessions.active().await {
            self.reporter.track(
                "messagesReceived",
                json!({ "sessionId": session.id, "fragments": reply.messages().len() }),
            );
        }
        Ok(reply)
    }

    /// End the active session, keeping the credential.
    pub async fn end_session(&self) {
        self.sessions.end(None).await;
        self.sync_lifecycle().await;
    }

    /// End the active session and forget the credential.
    pub async fn cleanup(&self) {
        self.sessions.end(None).await;
        self.tokens.clear().await;
        self.set_lifecycle(LifecycleState::Ended);
        tracing::info!("chat widget cleaned up");
    }

    pub fn set_minimized(&self, minimized: bool) {
        let next = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.minimized == minimized {
                return;
            }
            state.minimized = minimized;
            *state
        };
        self.reporter
            .notify(OutboundMessage::WidgetStateChanged(next));
    }

    /// Apply a message from the hosting frame. Returns the new snapshot.
    pub fn handle_host_message(&self, message: InboundMessage) -> Arc<WidgetConfig> {
        let current = self.config();
        let next = match &message {
            InboundMessage::MciConfigUpdate { config } => current.with_update(config),
            InboundMessage::MciThemeChange { theme } => current.with_theme(theme),
        };
        if next.analytics != current.analytics {
            self.reporter.replace_analytics(next.analytics.clone());
        }
        let next = Arc::new(next);
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        tracing::debug!(?message, "applied host message");
        next
    }

    async fn sync_lifecycle(&self) {
        let lifecycle = if self.sessions.active().await.is_some() {
            LifecycleState::SessionActive
        } else if self.tokens.is_authenticated().await {
            LifecycleState::Authenticated
        } else {
            LifecycleState::Unauthenticated
        };
        self.set_lifecycle(lifecycle);
    }

    fn set_lifecycle(&self, lifecycle: LifecycleState) {
        let next = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.lifecycle == lifecycle {
                return;
            }
            state.lifecycle = lifecycle;
            *state
        };
        tracing::debug!(?lifecycle, "widget lifecycle changed");
        self.reporter
            .notify(OutboundMessage::WidgetStateChanged(next));
    }
}
