//! Agent sessions and messaging.
//!
//! Provides:
//! - `AgentApi` - HTTP client for the agent-session API
//! - `SessionManager` - the single active session
//! - `MessageChannel` - user messages with lazy session start
//! - `ChatWidget` - facade wiring auth, sessions and the hosting frame

pub mod api;
pub mod channel;
pub mod manager;
pub mod widget;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{AgentApi, ApiError};
pub use channel::{MessageChannel, MessageError};
pub use manager::{Session, SessionError, SessionManager};
pub use widget::{ChatWidget, ChatWidgetBuilder};
