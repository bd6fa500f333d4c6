//! Text framing of host-frame messages.

use agentforce_core::{InboundMessage, OutboundMessage};
use serde_json::Value;

/// Message types the widget accepts from its host.
pub const INBOUND_TYPES: [&str; 2] = ["MCI_CONFIG_UPDATE", "MCI_THEME_CHANGE"];

/// Frame decoding error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode an outbound message as one text frame.
///
/// # Errors
/// Returns `ProtocolError` if the message cannot be serialized.
pub fn encode(message: &OutboundMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a text frame from the host.
///
/// Frames of any other type are not for the widget and decode to `None`.
///
/// # Errors
/// Returns `ProtocolError` for invalid JSON or a known type with an
/// invalid body.
pub fn decode(text: &str) -> Result<Option<InboundMessage>, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let known = value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|kind| INBOUND_TYPES.contains(&kind));
    if !known {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}
