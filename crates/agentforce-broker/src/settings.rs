//! Broker settings, read from flags or the environment.

use std::fmt;

use agentforce_core::{
    RemoteConfig, ThemeConfig, ThemePatch,
    config::DEFAULT_API_VERSION,
};
use clap::Parser;

/// Settings of the credential broker.
#[derive(Clone, Parser)]
#[command(name = "agentforce-broker", about = "Trusted backend for the Agentforce chat widget")]
pub struct BrokerSettings {
    #[arg(long, env = "SALESFORCE_INSTANCE_URL")]
    pub instance_url: String,

    #[arg(long, env = "SALESFORCE_CLIENT_ID")]
    pub client_id: String,

    #[arg(long, env = "SALESFORCE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    #[arg(long, env = "SALESFORCE_AGENT_ID")]
    pub agent_id: String,

    #[arg(long, env = "SALESFORCE_API_VERSION", default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    /// Report debug mode to widgets regardless of the environment.
    #[arg(long, env = "DEBUG_MODE")]
    pub debug_mode: bool,

    /// Deployment environment; anything but `production` implies debug.
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: String,

    #[arg(long, env = "CHAT_PRIMARY_COLOR")]
    pub primary_color: Option<String>,

    #[arg(long, env = "CHAT_HEADER_TITLE")]
    pub header_title: Option<String>,

    #[arg(long, env = "CHAT_WELCOME_MESSAGE")]
    pub welcome_message: Option<String>,

    /// Redirect URI sent with code exchanges. Derived from the request
    /// host when unset.
    #[arg(long, env = "OAUTH_REDIRECT_URI")]
    pub oauth_redirect_uri: Option<String>,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
}

impl fmt::Debug for BrokerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("instance_url", &self.instance_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("agent_id", &self.agent_id)
            .field("api_version", &self.api_version)
            .field("environment", &self.environment)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl BrokerSettings {
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Whether widgets should run with debug logging.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug_mode || !self.is_production()
    }

    /// Identity-provider token endpoint.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/services/oauth2/token",
            self.instance_url.trim_end_matches('/')
        )
    }

    /// Payload served to widgets. Never carries the secret.
    #[must_use]
    pub fn widget_config(&self) -> RemoteConfig {
        let defaults = ThemeConfig::default();
        RemoteConfig {
            instance_url: Some(self.instance_url.clone()),
            client_id: Some(self.client_id.clone()),
            agent_id: Some(self.agent_id.clone()),
            api_version: Some(self.api_version.clone()),
            debug: self.debug(),
            theme: Some(ThemePatch {
                primary_color: Some(
                    self.primary_color
                        .clone()
                        .unwrap_or(defaults.primary_color),
                ),
                header_title: Some(self.header_title.clone().unwrap_or(defaults.header_title)),
                welcome_message: Some(
                    self.welcome_message
                        .clone()
                        .unwrap_or(defaults.welcome_message),
                ),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn settings(instance_url: &str) -> BrokerSettings {
        BrokerSettings {
            instance_url: instance_url.to_string(),
            client_id: "client-1".to_string(),
            client_secret: "s3cret".to_string(),
            agent_id: "A1".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            debug_mode: false,
            environment: "production".to_string(),
            primary_color: None,
            header_title: Some("Support".to_string()),
            welcome_message: None,
            oauth_redirect_uri: None,
            port: 0,
        }
    }

    #[test]
    fn test_parse_from_flags() {
        let parsed = BrokerSettings::try_parse_from([
            "agentforce-broker",
            "--instance-url",
            "https://org.my.salesforce.com",
            "--client-id",
            "X",
            "--client-secret",
            "Y",
            "--agent-id",
            "A1",
        ])
        .unwrap();
        assert_eq!(parsed.client_id, "X");
        assert_eq!(parsed.token_endpoint(), "https://org.my.salesforce.com/services/oauth2/token");
    }

    #[test]
    fn test_debug_follows_environment() {
        let mut s = settings("https://org");
        assert!(!s.debug());
        s.environment = "development".to_string();
        assert!(s.debug());
    }

    #[test]
    fn test_widget_config_fills_theme_defaults() {
        let config = settings("https://org").widget_config();
        let theme = config.theme.unwrap();
        assert_eq!(theme.header_title.as_deref(), Some("Support"));
        assert_eq!(
            theme.primary_color,
            Some(ThemeConfig::default().primary_color)
        );
    }

    #[test]
    fn test_debug_output_hides_secret() {
        let rendered = format!("{:?}", settings("https://org"));
        assert!(!rendered.contains("s3cret"));
    }
}
