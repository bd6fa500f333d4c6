//! Agent replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shown when a reply carries no usable text.
pub const NO_CONTENT_REPLY: &str =
    "I received your message but could not generate a response. Please try again.";

/// Appended to the conversation after a failed send.
pub const SEND_FAILURE_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Raw response of the agent API, returned unmodified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentReply(Value);

impl AgentReply {
    #[must_use]
    pub const fn new(raw: Value) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_raw(self) -> Value {
        self.0
    }

    /// Reply fragments in order.
    #[must_use]
    pub fn messages(&self) -> &[Value] {
        self.0
            .get("messages")
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    /// Most recent fragment.
    #[must_use]
    pub fn last_fragment(&self) -> Option<&Value> {
        self.messages().last()
    }

    /// Text of the last fragment's `message` field only.
    #[must_use]
    pub fn last_message(&self) -> Option<&str> {
        self.last_fragment().and_then(|m| non_empty_str(m, "message"))
    }

    /// Best text for display, if any.
    ///
    /// Last fragment's `message`, then its `content`, then the top-level
    /// `content` and `message`.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.last_message()
            .or_else(|| self.last_fragment().and_then(|m| non_empty_str(m, "content")))
            .or_else(|| non_empty_str(&self.0, "content"))
            .or_else(|| non_empty_str(&self.0, "message"))
    }

    /// Display text with the fixed fallback.
    #[must_use]
    pub fn display_text(&self) -> &str {
        self.text().unwrap_or(NO_CONTENT_REPLY)
    }
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
