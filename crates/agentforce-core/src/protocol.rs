//! Wire protocol between the widget and its hosting frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ConfigUpdate, ThemePatch};

/// Where the widget is in its authentication/session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    /// No credential yet.
    Unauthenticated,
    /// Acquisition in flight.
    Authenticating,
    /// Credential held, no session.
    Authenticated,
    /// Session open and usable.
    SessionActive,
    /// Torn down; credential cleared.
    Ended,
}

/// Telemetry event delivered to the hosting frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub tracking_id: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl TelemetryEvent {
    /// Session id carried in the payload, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.payload.get("sessionId").and_then(Value::as_str)
    }
}

/// Structured error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
}

/// Visible widget state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetState {
    pub minimized: bool,
    pub lifecycle: LifecycleState,
}

/// Message from the widget to the hosting frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OutboundMessage {
    #[serde(rename = "AGENTFORCE_ANALYTICS")]
    Analytics(TelemetryEvent),
    #[serde(rename = "AGENTFORCE_ERROR")]
    Error(ErrorReport),
    #[serde(rename = "WIDGET_STATE_CHANGED")]
    WidgetStateChanged(WidgetState),
}

impl OutboundMessage {
    /// Wire name of the message type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Analytics(_) => "AGENTFORCE_ANALYTICS",
            Self::Error(_) => "AGENTFORCE_ERROR",
            Self::WidgetStateChanged(_) => "WIDGET_STATE_CHANGED",
        }
    }
}

/// Message from the hosting frame to the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
    /// Runtime configuration override.
    MciConfigUpdate { config: ConfigUpdate },
    /// Theme override.
    MciThemeChange { theme: ThemePatch },
}
