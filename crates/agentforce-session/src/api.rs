//! Client for the hosted agent-session API.

use agentforce_core::Credential;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Agent API error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("{status}{}", .body.as_ref().map(|b| format!(": {b}")).unwrap_or_default())]
    Status { status: u16, body: Option<Value> },
    #[error("Invalid response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceConfig {
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingCapabilities {
    pub chunk_types: Vec<String>,
}

/// Body of a session-creation request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub external_session_key: Uuid,
    pub instance_config: InstanceConfig,
    pub streaming_capabilities: StreamingCapabilities,
    pub bypass_user: bool,
}

impl SessionRequest {
    /// Request for a text-only session on `instance_url`.
    #[must_use]
    pub fn text(external_session_key: Uuid, instance_url: &str) -> Self {
        Self {
            external_session_key,
            instance_config: InstanceConfig {
                endpoint: instance_url.to_string(),
            },
            streaming_capabilities: StreamingCapabilities {
                chunk_types: vec!["Text".to_string()],
            },
            bypass_user: true,
        }
    }
}

/// Kind of an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    Text,
}

/// A user message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sequence_id: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: String,
}

/// Body of a message request.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub message: Message,
    pub variables: Vec<Value>,
}

/// HTTP client for agent sessions.
#[derive(Debug, Clone)]
pub struct AgentApi {
    base_url: String,
    http: reqwest::Client,
}

impl AgentApi {
    /// Create a client for the API rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    #[must_use]
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// `POST /agents/{agent_id}/sessions`.
    ///
    /// # Errors
    /// Returns `ApiError::Status` for any non-2xx response.
    pub async fn create_session(
        &self,
        credential: &Credential,
        agent_id: &str,
        request: &SessionRequest,
    ) -> Result<Value, ApiError> {
        let url = format!("{}/agents/{agent_id}/sessions", self.base_url);
        let resp = self
            .http
            .post(url)
            .header("Authorization", credential.bearer())
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;
        json_body(resp).await
    }

    /// `POST /sessions/{session_id}/messages`.
    ///
    /// # Errors
    /// Returns `ApiError::Status` for any non-2xx response.
    pub async fn send_message(
        &self,
        credential: &Credential,
        session_id: &str,
        request: &MessageRequest,
    ) -> Result<Value, ApiError> {
        let url = format!("{}/sessions/{session_id}/messages", self.base_url);
        let resp = self
            .http
            .post(url)
            .header("Authorization", credential.bearer())
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;
        json_body(resp).await
    }

    /// `DELETE /sessions/{session_id}`. Any 2xx, including 204, succeeds.
    ///
    /// # Errors
    /// Returns `ApiError::Status` for any non-2xx response.
    pub async fn delete_session(
        &self,
        credential: &Credential,
        session_id: &str,
    ) -> Result<(), ApiError> {
        let url = format!("{}/sessions/{session_id}", self.base_url);
        let resp = self
            .http
            .delete(url)
            .header("Authorization", credential.bearer())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let status = resp.status();
        if status.is_success() || status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                body: resp.json().await.ok(),
            })
        }
    }
}

async fn json_body(resp: reqwest::Response) -> Result<Value, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: resp.json().await.ok(),
        });
    }
    resp.json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_request_shape() {
        let key = Uuid::new_v4();
        let body = serde_json::to_value(SessionRequest::text(key, "https://org")).unwrap();
        assert_eq!(
            body,
            json!({
                "externalSessionKey": key.to_string(),
                "instanceConfig": { "endpoint": "https://org" },
                "streamingCapabilities": { "chunkTypes": ["Text"] },
                "bypassUser": true
            })
        );
    }

    #[test]
    fn test_message_request_shape() {
        let body = serde_json::to_value(MessageRequest {
            message: Message {
                sequence_id: 42,
                kind: MessageKind::Text,
                text: "Hello".to_string(),
            },
            variables: Vec::new(),
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "message": { "sequenceId": 42, "type": "Text", "text": "Hello" },
                "variables": []
            })
        );
    }

    #[test]
    fn test_status_error_display() {
        let err = ApiError::Status {
            status: 400,
            body: Some(json!({ "error": "bad" })),
        };
        assert_eq!(err.to_string(), r#"400: {"error":"bad"}"#);
        let err = ApiError::Status {
            status: 502,
            body: None,
        };
        assert_eq!(err.to_string(), "502");
    }
}
