//! Bearer credential and token responses.

use std::{fmt, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A bearer token and the instant it stops being usable.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential with an explicit expiry.
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Create a credential that expires `ttl` from now.
    #[must_use]
    pub fn issued_now(access_token: impl Into<String>, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(access_token, expires_at)
    }

    /// The opaque bearer token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Valid strictly before `expires_at`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Value for an `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token payload returned by the credential broker.
///
/// The broker strips secret fields; anything else is kept in `extra`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenResponse {
    /// Token response carrying only an access token.
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("instance_url", &self.instance_url)
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_is_strictly_before_expiry() {
        let now = Utc::now();
        let credential = Credential::new("tok", now);
        assert!(!credential.is_valid_at(now));
        assert!(credential.is_valid_at(now - TimeDelta::seconds(1)));
    }

    #[test]
    fn test_issued_now_uses_ttl() {
        let credential = Credential::issued_now("tok", Duration::from_secs(7200));
        let remaining = credential.expires_at() - Utc::now();
        assert!(remaining > TimeDelta::minutes(119));
        assert!(remaining <= TimeDelta::minutes(120));
        assert!(credential.is_valid());
    }

    #[test]
    fn test_debug_never_prints_token() {
        let credential = Credential::issued_now("secret-token", Duration::from_secs(60));
        assert!(!format!("{credential:?}").contains("secret-token"));

        let response = TokenResponse::bearer("secret-token");
        assert!(!format!("{response:?}").contains("secret-token"));
    }

    #[test]
    fn test_token_response_keeps_unknown_fields() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"tok1","instance_url":"https://org","signature":"abc"}"#,
        )
        .unwrap();
        assert_eq!(response.access_token, "tok1");
        assert_eq!(response.instance_url.as_deref(), Some("https://org"));
        assert_eq!(response.extra["signature"], "abc");
    }
}
