//! Widget configuration.
//!
//! `AuthConfig` is fixed for the lifetime of a widget. Everything the hosting
//! frame may override at runtime lives next to it in `WidgetConfig`, and an
//! override always yields a new snapshot instead of mutating the old one.

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API version used when the configuration endpoint does not name one.
pub const DEFAULT_API_VERSION: &str = "v61.0";

/// Base URL of the hosted agent-session API.
pub const DEFAULT_AGENT_API_BASE: &str = "https://api.salesforce.com/einstein/ai-agent/v1";

/// Scope requested by the interactive authorization flow.
pub const DEFAULT_SCOPE: &str = "api refresh_token";

/// Lifetime assigned to every freshly acquired credential.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Longest message the widget accepts from the user.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 2000;

/// Path of the OAuth callback page relative to the widget origin.
pub const OAUTH_CALLBACK_PATH: &str = "/oauth-callback.html";

/// Configuration error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("Configuration unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings needed to authenticate and address the remote agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    pub instance_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub agent_id: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_agent_api_base")]
    pub agent_api_base: String,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_agent_api_base() -> String {
    DEFAULT_AGENT_API_BASE.to_string()
}

impl AuthConfig {
    /// Create an auth config with the default API version and agent base.
    #[must_use]
    pub fn new(
        instance_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            instance_url: instance_url.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            agent_id: agent_id.into(),
            api_version: default_api_version(),
            agent_api_base: default_agent_api_base(),
        }
    }

    /// Point the agent-session API somewhere else.
    #[must_use]
    pub fn with_agent_api_base(mut self, base: impl Into<String>) -> Self {
        self.agent_api_base = base.into();
        self
    }

    /// Check that every required key is present.
    ///
    /// # Errors
    /// Returns `ConfigError::Missing` naming each empty key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&'static str> = [
            ("instanceUrl", &self.instance_url),
            ("clientId", &self.client_id),
            ("redirectUri", &self.redirect_uri),
            ("agentId", &self.agent_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }

    /// Authorization endpoint of the identity provider.
    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        format!(
            "{}/services/oauth2/authorize",
            self.instance_url.trim_end_matches('/')
        )
    }
}

/// Visual settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeConfig {
    pub primary_color: String,
    pub header_title: String,
    pub welcome_message: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            primary_color: "rgb(5, 19, 75)".to_string(),
            header_title: "Insights Powered by".to_string(),
            welcome_message: "Hello! I'm your Agentforce assistant. How can I help you today?"
                .to_string(),
        }
    }
}

/// Partial theme sent by the configuration endpoint or the hosting frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
}

impl ThemeConfig {
    /// Theme with the patch's fields applied on top.
    #[must_use]
    pub fn merged(&self, patch: &ThemePatch) -> Self {
        Self {
            primary_color: patch
                .primary_color
                .clone()
                .unwrap_or_else(|| self.primary_color.clone()),
            header_title: patch
                .header_title
                .clone()
                .unwrap_or_else(|| self.header_title.clone()),
            welcome_message: patch
                .welcome_message
                .clone()
                .unwrap_or_else(|| self.welcome_message.clone()),
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsConfig {
    pub enable_tracking: bool,
    pub tracking_id: String,
    /// Internal event name -> name reported to the hosting frame.
    pub events: HashMap<String, String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        let events = [
            ("sessionStart", "agentforce_session_start"),
            ("messagesSent", "agentforce_message_sent"),
            ("messagesReceived", "agentforce_message_received"),
            ("sessionEnd", "agentforce_session_end"),
            ("errors", "agentforce_error"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            enable_tracking: true,
            tracking_id: String::new(),
            events,
        }
    }
}

impl AnalyticsConfig {
    /// Reported name for an event, or the raw name when unmapped.
    #[must_use]
    pub fn event_name<'a>(&'a self, raw: &'a str) -> &'a str {
        self.events.get(raw).map_or(raw, String::as_str)
    }
}

/// Partial analytics settings sent by the hosting frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_tracking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
}

/// Conversation limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub max_message_length: usize,
    pub token_ttl: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            token_ttl: DEFAULT_TOKEN_TTL,
        }
    }
}

/// Complete widget configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub auth: AuthConfig,
    pub theme: ThemeConfig,
    pub analytics: AnalyticsConfig,
    pub chat: ChatSettings,
    pub debug: bool,
}

impl WidgetConfig {
    /// Create a config with default theme, analytics and limits.
    #[must_use]
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            auth,
            theme: ThemeConfig::default(),
            analytics: AnalyticsConfig::default(),
            chat: ChatSettings::default(),
            debug: false,
        }
    }

    /// Snapshot with a hosting-frame config update applied.
    ///
    /// Authentication settings are never touched.
    #[must_use]
    pub fn with_update(&self, update: &ConfigUpdate) -> Self {
        let mut next = self.clone();
        if let Some(theme) = &update.theme {
            next.theme = next.theme.merged(theme);
        }
        if let Some(analytics) = &update.analytics {
            if let Some(enabled) = analytics.enable_tracking {
                next.analytics.enable_tracking = enabled;
            }
            if let Some(id) = &analytics.tracking_id {
                next.analytics.tracking_id.clone_from(id);
            }
        }
        if let Some(debug) = update.debug {
            next.debug = debug;
        }
        next
    }

    /// Snapshot with a theme patch applied.
    #[must_use]
    pub fn with_theme(&self, patch: &ThemePatch) -> Self {
        let mut next = self.clone();
        next.theme = next.theme.merged(patch);
        next
    }
}

/// Runtime overrides accepted from the hosting frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemePatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<AnalyticsPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

/// Payload of the backend configuration endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default)]
    pub instance_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub theme: Option<ThemePatch>,
}

fn non_empty(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

impl RemoteConfig {
    /// Whether the endpoint has delivered the keys the widget waits for.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        non_empty(self.instance_url.as_ref()) && non_empty(self.client_id.as_ref())
    }

    /// Build a validated widget config.
    ///
    /// # Errors
    /// Returns `ConfigError::Missing` if a required key is absent.
    pub fn into_widget_config(
        self,
        redirect_uri: impl Into<String>,
    ) -> Result<WidgetConfig, ConfigError> {
        let mut auth = AuthConfig::new(
            self.instance_url.unwrap_or_default(),
            self.client_id.unwrap_or_default(),
            redirect_uri,
            self.agent_id.unwrap_or_default(),
        );
        if let Some(version) = self.api_version.filter(|v| !v.trim().is_empty()) {
            auth.api_version = version;
        }
        auth.validate()?;

        let mut config = WidgetConfig::new(auth);
        config.debug = self.debug;
        if let Some(theme) = &self.theme {
            config.theme = config.theme.merged(theme);
        }
        Ok(config)
    }
}
