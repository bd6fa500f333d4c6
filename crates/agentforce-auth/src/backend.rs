//! HTTP client for the widget's trusted backend.

use std::time::Duration;

use agentforce_core::{BrokerError, ConfigError, CredentialBroker, RemoteConfig, TokenResponse};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Machine-to-machine token endpoint.
pub const CLIENT_CREDENTIALS_PATH: &str = "/api/oauth/client-credentials";
/// Authorization-code exchange endpoint.
pub const TOKEN_EXCHANGE_PATH: &str = "/api/oauth/token";
/// Widget configuration endpoint.
pub const CONFIG_PATH: &str = "/api/config";

/// Attempts made by [`BackendClient::load_config`] by default.
pub const CONFIG_ATTEMPTS: u32 = 10;
/// Delay between configuration attempts.
pub const CONFIG_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Client for the backend that brokers credentials and serves config.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    /// Create a client for the backend at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fetch the widget configuration once.
    ///
    /// # Errors
    /// Returns error on transport failure, non-2xx or an undecodable body.
    pub async fn fetch_config(&self) -> Result<RemoteConfig, BrokerError> {
        let resp = self
            .http
            .get(self.url(CONFIG_PATH))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| BrokerError::Http(e.to_string()))?;
        decode(resp).await
    }

    /// Fetch the configuration until it is populated.
    ///
    /// # Errors
    /// Returns `ConfigError::Unavailable` once `attempts` are exhausted.
    pub async fn load_config(
        &self,
        attempts: u32,
        delay: Duration,
    ) -> Result<RemoteConfig, ConfigError> {
        for attempt in 1..=attempts {
            match self.fetch_config().await {
                Ok(config) if config.is_populated() => {
                    tracing::debug!(attempt, "configuration loaded");
                    return Ok(config);
                }
                Ok(_) => tracing::debug!(attempt, "configuration not populated yet"),
                Err(e) => tracing::warn!(attempt, "failed to load configuration: {e}"),
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }
        Err(ConfigError::Unavailable { attempts })
    }

    async fn post_token(&self, path: &str, body: Option<Value>) -> Result<TokenResponse, BrokerError> {
        let mut req = self
            .http
            .post(self.url(path))
            .header("Accept", "application/json");
        req = match body {
            Some(body) => req.json(&body),
            None => req.header("Content-Type", "application/json"),
        };

        let resp = req
            .send()
            .await
            .map_err(|e| BrokerError::Http(e.to_string()))?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, BrokerError> {
    let status = resp.status();
    if !status.is_success() {
        let body: Option<Value> = resp.json().await.ok();
        let message = body
            .as_ref()
            .and_then(|b| b.get("message").or_else(|| b.get("error")))
            .and_then(Value::as_str)
            .map_or_else(
                || {
                    format!(
                        "HTTP {}: {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("")
                    )
                },
                str::to_string,
            );
        return Err(BrokerError::Status {
            status: status.as_u16(),
            message,
        });
    }

    resp.json()
        .await
        .map_err(|e| BrokerError::Decode(e.to_string()))
}

#[async_trait]
impl CredentialBroker for BackendClient {
    async fn client_credentials(&self) -> Result<TokenResponse, BrokerError> {
        self.post_token(CLIENT_CREDENTIALS_PATH, None).await
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, BrokerError> {
        self.post_token(TOKEN_EXCHANGE_PATH, Some(serde_json::json!({ "code": code })))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    #[tokio::test]
    async fn test_client_credentials_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CLIENT_CREDENTIALS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok1",
                "instance_url": "https://org.my.salesforce.com",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri());
        let token = client.client_credentials().await.unwrap();
        assert_eq!(token.access_token, "tok1");
        assert_eq!(token.token_type.as_deref(), Some("Bearer"));
    }

    #[tokio::test]
    async fn test_error_message_is_taken_from_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CLIENT_CREDENTIALS_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "Authentication failed",
                "message": "invalid_client"
            })))
            .mount(&server)
            .await;

        let err = BackendClient::new(server.uri())
            .client_credentials()
            .await
            .unwrap_err();
        match err {
            BrokerError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "invalid_client");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exchange_code_posts_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_EXCHANGE_PATH))
            .and(body_json(json!({ "code": "c-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok2" })))
            .expect(1)
            .mount(&server)
            .await;

        let token = BackendClient::new(server.uri())
            .exchange_code("c-1")
            .await
            .unwrap();
        assert_eq!(token.access_token, "tok2");
    }

    #[tokio::test]
    async fn test_load_config_retries_until_populated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONFIG_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "instanceUrl": "" })))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CONFIG_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "instanceUrl": "https://org.my.salesforce.com",
                "clientId": "X",
                "agentId": "A1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = BackendClient::new(server.uri())
            .load_config(5, Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(config.agent_id.as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_load_config_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONFIG_PATH))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = BackendClient::new(server.uri())
            .load_config(3, Duration::from_millis(5))
            .await
            .unwrap_err();
        assert_eq!(err, ConfigError::Unavailable { attempts: 3 });
    }
}
