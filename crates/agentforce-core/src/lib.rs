//! Core abstractions for the embedded Agentforce chat widget.
//!
//! This crate provides the fundamental building blocks:
//! - `Credential` / `AuthConfig` / `WidgetConfig` - the data model
//! - `CredentialStore`, `CredentialBroker`, `HostFrame`, `ConsentLauncher` - seams
//! - `OutboundMessage` / `InboundMessage` - hosting-frame protocol
//! - `FrameOutbox` - broadcast + history delivery to the hosting frame
//! - `EventReporter` - telemetry and error reports

pub mod config;
pub mod credential;
pub mod events;
pub mod outbox;
pub mod protocol;
pub mod reply;
pub mod traits;

pub use config::{
    AnalyticsConfig, AuthConfig, ChatSettings, ConfigError, ConfigUpdate, RemoteConfig,
    ThemeConfig, ThemePatch, WidgetConfig,
};
pub use credential::{Credential, TokenResponse};
pub use events::EventReporter;
pub use outbox::{DetachedFrame, FrameOutbox};
pub use protocol::{
    ErrorReport, InboundMessage, LifecycleState, OutboundMessage, TelemetryEvent, WidgetState,
};
pub use reply::{AgentReply, NO_CONTENT_REPLY, SEND_FAILURE_REPLY};
pub use traits::{
    BrokerError, CallbackPayload, ConsentCallback, ConsentError, ConsentLauncher, ConsentWindow,
    CredentialBroker, CredentialStore, HostFrame, StoreError,
};
