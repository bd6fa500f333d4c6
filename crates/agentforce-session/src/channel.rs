//! Sending user messages into a session.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use agentforce_core::{AgentReply, EventReporter};
use chrono::Utc;
use serde_json::json;

use crate::{
    AgentApi, SessionError, SessionManager,
    api::{ApiError, Message, MessageKind, MessageRequest},
};

/// Message channel error.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message rejected: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Message send failed: {0}")]
    Send(#[source] ApiError),
}

impl MessageError {
    /// HTTP status of a rejected send.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Send(ApiError::Status { status, .. }) => Some(*status),
            Self::Session(e) => e.status(),
            _ => None,
        }
    }
}

/// Millisecond clock that never runs backwards.
#[derive(Debug, Default)]
struct SequenceClock {
    last: AtomicI64,
}

impl SequenceClock {
    fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self.last.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }
}

/// Delivers user messages, starting a session on first use.
pub struct MessageChannel {
    api: AgentApi,
    sessions: Arc<SessionManager>,
    reporter: EventReporter,
    sequence: SequenceClock,
}

impl MessageChannel {
    #[must_use]
    pub fn new(api: AgentApi, sessions: Arc<SessionManager>, reporter: EventReporter) -> Self {
        Self {
            api,
            sessions,
            reporter,
            sequence: SequenceClock::default(),
        }
    }

    /// Send `text` to `session_id`, or to the active session.
    ///
    /// Without an explicit id a session is started when none is usable.
    /// An empty id is treated as no id.
    /// A failed send leaves the session in place.
    ///
    /// # Errors
    /// Returns `MessageError::Session` if no session could be addressed
    /// and `MessageError::Send` if the platform rejected the message.
    pub async fn send(
        &self,
        text: &str,
        session_id: Option<&str>,
    ) -> Result<AgentReply, MessageError> {
        let (id, credential) = match session_id.filter(|id| !id.is_empty()) {
            Some(id) => match self.sessions.credential_for(id).await {
                Ok(credential) => (id.to_string(), credential),
                Err(e) => {
                    self.reporter
                        .report_error("Failed to send message to Agentforce", &e, Some(id));
                    return Err(e.into());
                }
            },
            None => {
                let session = self.sessions.ensure_active().await?;
                (session.id, session.credential)
            }
        };

        let request = MessageRequest {
            message: Message {
                sequence_id: self.sequence.next(),
                kind: MessageKind::Text,
                text: text.to_string(),
            },
            variables: Vec::new(),
        };
        let length = text.chars().count();
        tracing::debug!(session_id = %id, sequence_id = request.message.sequence_id, length, "sending message");

        match self.api.send_message(&credential, &id, &request).await {
            Ok(raw) => {
                self.reporter.track(
                    "messagesSent",
                    json!({ "sessionId": id, "messageLength": length }),
                );
                Ok(AgentReply::new(raw))
            }
            Err(e) => {
                let err = MessageError::Send(e);
                self.reporter
                    .report_error("Failed to send message to Agentforce", &err, Some(&id));
                Err(err)
            }
        }
    }
}
