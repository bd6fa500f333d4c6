//! Transport between the widget and its hosting frame.
//!
//! Provides:
//! - Text framing of host messages
//! - WebSocket host bridge (feature: websocket)

pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use protocol::{ProtocolError, decode, encode};

#[cfg(feature = "websocket")]
pub use websocket::{HOST_PATH, host_bridge_router};
