//! Session manager for the single active agent session.

use std::sync::Arc;

use agentforce_auth::{AuthError, TokenProvider};
use agentforce_core::{AgentReply, AuthConfig, Credential, EventReporter};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::{AgentApi, ApiError, SessionRequest};

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Session creation failed: {0}")]
    Creation(#[source] ApiError),
    #[error("Session creation response carried no session id")]
    MissingSessionId,
    #[error("Session {0} is bound to an expired credential")]
    Expired(String),
    #[error("No valid credential for session {0}")]
    NoCredential(String),
    #[error("Failed to end session: {0}")]
    Teardown(String),
}

impl SessionError {
    /// HTTP status of a rejected creation request.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Creation(ApiError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// An open agent session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Id assigned by the agent platform.
    pub id: String,
    /// Client-generated correlation key.
    pub external_session_key: Uuid,
    /// Credential the session was created with.
    pub credential: Credential,
    pub started_at: DateTime<Utc>,
    /// Raw session-creation response; may carry a greeting.
    pub opening: AgentReply,
}

impl Session {
    /// Usable while its credential is.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.credential.is_valid()
    }
}

/// Owns the lifecycle of the one active session.
///
/// Starting a session while another is active ends the previous one
/// first. All operations are serialized on the active-session lock.
pub struct SessionManager {
    api: AgentApi,
    tokens: Arc<TokenProvider>,
    auth: Arc<AuthConfig>,
    reporter: EventReporter,
    active: Mutex<Option<Session>>,
}

impl SessionManager {
    /// Create a session manager.
    #[must_use]
    pub fn new(
        api: AgentApi,
        tokens: Arc<TokenProvider>,
        auth: Arc<AuthConfig>,
        reporter: EventReporter,
    ) -> Self {
        Self {
            api,
            tokens,
            auth,
            reporter,
            active: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn tokens(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    /// The active session, if any.
    pub async fn active(&self) -> Option<Session> {
        self.active.lock().await.clone()
    }

    /// Start a new session.
    ///
    /// # Errors
    /// Returns `SessionError::Auth` if no credential can be acquired and
    /// `SessionError::Creation` if the platform rejects the request.
    /// Creation is never retried here.
    pub async fn start(&self) -> Result<Session, SessionError> {
        let mut active = self.active.lock().await;
        self.start_locked(&mut active).await
    }

    /// The active session if usable, else a newly started one.
    ///
    /// # Errors
    /// Same as [`SessionManager::start`].
    pub async fn ensure_active(&self) -> Result<Session, SessionError> {
        let mut active = self.active.lock().await;
        if let Some(session) = active.as_ref().filter(|s| s.is_usable()) {
            return Ok(session.clone());
        }
        self.start_locked(&mut active).await
    }

    async fn start_locked(&self, active: &mut Option<Session>) -> Result<Session, SessionError> {
        let previous_id = active.as_ref().map(|s| s.id.clone());
        let credential = self
            .tokens
            .acquire_for_session(previous_id.as_deref())
            .await?;

        if let Some(previous) = active.take() {
            tracing::info!(session_id = %previous.id, "ending previous session before starting a new one");
            let teardown_credential = if previous.is_usable() {
                &previous.credential
            } else {
                &credential
            };
            self.teardown(&previous.id, Some(teardown_credential)).await;
        }

        let external_session_key = Uuid::new_v4();
        let request = SessionRequest::text(external_session_key, &self.auth.instance_url);
        tracing::debug!(%external_session_key, agent_id = %self.auth.agent_id, "creating agent session");

        let response = match self
            .api
            .create_session(&credential, &self.auth.agent_id, &request)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let err = SessionError::Creation(e);
                self.reporter
                    .report_error("Failed to start Agentforce session", &err, None);
                return Err(err);
            }
        };

        let Some(id) = response
            .get("sessionId")
            .and_then(Value::as_str)
            .or_else(|| response.get("id").and_then(Value::as_str))
            .map(str::to_string)
        else {
            let err = SessionError::MissingSessionId;
            self.reporter
                .report_error("Failed to start Agentforce session", &err, None);
            return Err(err);
        };

        let session = Session {
            id,
            external_session_key,
            credential,
            started_at: Utc::now(),
            opening: AgentReply::new(response),
        };
        *active = Some(session.clone());

        tracing::info!(session_id = %session.id, "agent session created");
        self.reporter.track(
            "sessionStart",
            json!({
                "sessionId": session.id,
                "externalSessionKey": session.external_session_key,
            }),
        );
        Ok(session)
    }

    /// Credential to address `session_id` with.
    ///
    /// The active session's bound credential, or for any other id the
    /// credential currently held.
    ///
    /// # Errors
    /// Returns `Expired` if the active session's credential lapsed and
    /// `NoCredential` if no valid credential is held for another id.
    pub async fn credential_for(&self, session_id: &str) -> Result<Credential, SessionError> {
        {
            let active = self.active.lock().await;
            if let Some(session) = active.as_ref().filter(|s| s.id == session_id) {
                return if session.is_usable() {
                    Ok(session.credential.clone())
                } else {
                    Err(SessionError::Expired(session_id.to_string()))
                };
            }
        }
        self.tokens
            .current()
            .await
            .filter(Credential::is_valid)
            .ok_or_else(|| SessionError::NoCredential(session_id.to_string()))
    }

    /// End `session_id`, or the active session when `None`.
    ///
    /// Best-effort: failures are reported, never returned. Without a
    /// resolvable id nothing happens; an empty id counts as none.
    pub async fn end(&self, session_id: Option<&str>) {
        let mut active = self.active.lock().await;
        let Some(id) = session_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| active.as_ref().map(|s| s.id.clone()))
        else {
            return;
        };

        let is_active = active.as_ref().is_some_and(|s| s.id == id);
        let credential = if is_active {
            active
                .as_ref()
                .map(|s| s.credential.clone())
                .filter(Credential::is_valid)
        } else {
            None
        };
        let credential = match credential {
            Some(c) => Some(c),
            None => self.tokens.current().await.filter(Credential::is_valid),
        };

        self.teardown(&id, credential.as_ref()).await;

        if is_active {
            *active = None;
        }
    }

    async fn teardown(&self, session_id: &str, credential: Option<&Credential>) {
        let result = match credential {
            Some(credential) => self
                .api
                .delete_session(credential, session_id)
                .await
                .map_err(|e| SessionError::Teardown(e.to_string())),
            None => Err(SessionError::Teardown(
                "no valid credential available".to_string(),
            )),
        };

        match result {
            Ok(()) => tracing::info!(session_id, "agent session ended"),
            Err(e) => {
                self.reporter
                    .report_error("Failed to end session", &e, Some(session_id));
            }
        }
        self.reporter
            .track("sessionEnd", json!({ "sessionId": session_id }));
    }
}
