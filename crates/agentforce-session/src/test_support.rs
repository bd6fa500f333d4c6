//! Shared fixtures: one mock server plays both the backend and the agent API.

use std::{sync::Arc, time::Duration};

use agentforce_auth::{
    BackendClient, InteractiveFlow, TokenProvider, backend::CLIENT_CREDENTIALS_PATH,
    store::MemoryCredentialStore,
};
use agentforce_core::{
    AnalyticsConfig, AuthConfig, ConsentCallback, ConsentError, ConsentLauncher, ConsentWindow,
    EventReporter, FrameOutbox, HostFrame, OutboundMessage,
};
use async_trait::async_trait;
use serde_json::Value;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use crate::{AgentApi, SessionManager};

pub const SESSIONS_PATH: &str = "/agents/A1/sessions";

/// Consent UI the user always dismisses.
pub struct DismissedLauncher;

struct DismissedWindow;

#[async_trait]
impl ConsentWindow for DismissedWindow {
    async fn recv(&mut self) -> Option<ConsentCallback> {
        None
    }

    fn is_closed(&self) -> bool {
        true
    }

    fn close(&mut self) {}
}

#[async_trait]
impl ConsentLauncher for DismissedLauncher {
    async fn open(&self, _url: &str) -> Result<Box<dyn ConsentWindow>, ConsentError> {
        Ok(Box::new(DismissedWindow))
    }
}

pub fn auth_config(server: &MockServer) -> AuthConfig {
    AuthConfig::new(
        "https://org.my.salesforce.com",
        "client-1",
        "https://widget.example.com/oauth/callback",
        "A1",
    )
    .with_agent_api_base(server.uri())
}

pub struct Harness {
    pub server: MockServer,
    pub outbox: Arc<FrameOutbox>,
    pub reporter: EventReporter,
    pub tokens: Arc<TokenProvider>,
    pub sessions: Arc<SessionManager>,
    pub api: AgentApi,
}

impl Harness {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let auth = Arc::new(auth_config(&server));
        let outbox = Arc::new(FrameOutbox::new());
        let frame: Arc<dyn HostFrame> = outbox.clone();
        let reporter = EventReporter::new(AnalyticsConfig::default(), frame);

        let store = Arc::new(MemoryCredentialStore::default());
        let broker = Arc::new(BackendClient::new(server.uri()));
        let interactive = InteractiveFlow::new(
            auth.clone(),
            store.clone(),
            broker.clone(),
            Arc::new(DismissedLauncher),
        )
        .with_poll_interval(Duration::from_millis(10));
        let tokens = Arc::new(TokenProvider::new(
            store,
            broker,
            interactive,
            reporter.clone(),
        ));
        let api = AgentApi::new(server.uri());
        let sessions = Arc::new(SessionManager::new(
            api.clone(),
            tokens.clone(),
            auth,
            reporter.clone(),
        ));

        Self {
            server,
            outbox,
            reporter,
            tokens,
            sessions,
            api,
        }
    }

    /// Names of tracked telemetry events, in order.
    pub fn tracked(&self) -> Vec<String> {
        self.outbox
            .history()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::Analytics(event) => Some(event.event),
                _ => None,
            })
            .collect()
    }

    /// Messages of posted error reports, in order.
    pub fn errors(&self) -> Vec<String> {
        self.outbox
            .history()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::Error(report) => Some(report.message),
                _ => None,
            })
            .collect()
    }
}

pub async fn mount_broker(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(CLIENT_CREDENTIALS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "access_token": token })),
        )
        .expect(times)
        .mount(server)
        .await;
}

pub async fn mount_session(server: &MockServer, body: Value, times: u64) {
    Mock::given(method("POST"))
        .and(path(SESSIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

pub async fn mount_delete(server: &MockServer, session_id: &str, status: u16, times: u64) {
    Mock::given(method("DELETE"))
        .and(path(format!("/sessions/{session_id}")))
        .respond_with(ResponseTemplate::new(status))
        .expect(times)
        .mount(server)
        .await;
}

pub async fn mount_message(server: &MockServer, session_id: &str, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path(format!("/sessions/{session_id}/messages")))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}
