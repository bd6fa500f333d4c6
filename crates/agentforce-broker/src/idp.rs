//! Client for the identity provider's token endpoint.

use serde_json::{Map, Value};

use crate::{BrokerServerError, BrokerSettings};

/// Field stripped from every token response.
const CLIENT_SECRET_FIELD: &str = "client_secret";

/// Token-endpoint client holding the client secret.
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl IdentityProvider {
    #[must_use]
    pub fn new(settings: &BrokerSettings, http: reqwest::Client) -> Self {
        Self {
            token_endpoint: settings.token_endpoint(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            http,
        }
    }

    /// Machine-to-machine token.
    ///
    /// # Errors
    /// Returns `BrokerServerError::IdentityProvider` on any failure.
    pub async fn client_credentials(&self) -> Result<Map<String, Value>, BrokerServerError> {
        self.request(
            &[("grant_type", "client_credentials")],
            "Authentication failed",
            "Client credentials authentication failed",
        )
        .await
    }

    /// Exchange an authorization code.
    ///
    /// # Errors
    /// Returns `BrokerServerError::IdentityProvider` on any failure.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Map<String, Value>, BrokerServerError> {
        self.request(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ],
            "Token exchange failed",
            "Token exchange failed",
        )
        .await
    }

    async fn request(
        &self,
        grant: &[(&str, &str)],
        context: &'static str,
        fallback: &str,
    ) -> Result<Map<String, Value>, BrokerServerError> {
        let fail = |message: String| BrokerServerError::IdentityProvider { context, message };

        let mut form: Vec<(&str, &str)> = grant.to_vec();
        form.push(("client_id", self.client_id.as_str()));
        form.push(("client_secret", self.client_secret.as_str()));

        let resp = self
            .http
            .post(&self.token_endpoint)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body: Option<Value> = resp.json().await.ok();
            let message = body
                .as_ref()
                .and_then(|b| b.get("error_description"))
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string();
            tracing::warn!(status = status.as_u16(), "{context}: {message}");
            return Err(fail(message));
        }

        let mut token: Map<String, Value> = resp
            .json()
            .await
            .map_err(|e| fail(e.to_string()))?;
        token.remove(CLIENT_SECRET_FIELD);
        tracing::debug!(grant = grant[0].1, "token issued");
        Ok(token)
    }
}
