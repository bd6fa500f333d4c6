//! Telemetry and error reporting towards the hosting frame.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use chrono::Utc;
use serde_json::{Map, Value};

use crate::{
    AnalyticsConfig, ErrorReport, HostFrame, OutboundMessage, TelemetryEvent,
};

/// Internal name of the error telemetry event.
pub const ERRORS_EVENT: &str = "errors";

struct Inner {
    analytics: RwLock<Arc<AnalyticsConfig>>,
    frame: Arc<dyn HostFrame>,
}

/// Emits lifecycle telemetry and structured error reports.
///
/// Cheap to clone; clones share the frame and the analytics snapshot.
#[derive(Clone)]
pub struct EventReporter {
    inner: Arc<Inner>,
}

impl fmt::Debug for EventReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventReporter")
            .field("analytics", &self.analytics())
            .field("embedded", &self.inner.frame.is_embedded())
            .finish()
    }
}

impl EventReporter {
    /// Create a reporter delivering to `frame`.
    #[must_use]
    pub fn new(analytics: AnalyticsConfig, frame: Arc<dyn HostFrame>) -> Self {
        Self {
            inner: Arc::new(Inner {
                analytics: RwLock::new(Arc::new(analytics)),
                frame,
            }),
        }
    }

    /// Current analytics snapshot.
    #[must_use]
    pub fn analytics(&self) -> Arc<AnalyticsConfig> {
        Arc::clone(
            &self
                .inner
                .analytics
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Apply a new analytics snapshot to future events.
    pub fn replace_analytics(&self, analytics: AnalyticsConfig) {
        *self
            .inner
            .analytics
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(analytics);
    }

    /// Post any message to the hosting frame, if one is attached.
    pub fn notify(&self, message: OutboundMessage) {
        if self.inner.frame.is_embedded() {
            self.inner.frame.post(message);
        }
    }

    /// Track a telemetry event.
    ///
    /// `data` is flattened into the event; a non-object value is carried
    /// under `value`. Keys of `data` that collide with the event's own
    /// fields replace them. Never blocks and never fails.
    pub fn track(&self, event: &str, data: Value) {
        let analytics = self.analytics();
        if !analytics.enable_tracking {
            return;
        }

        let mut payload = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        let timestamp = payload
            .remove("timestamp")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_else(Utc::now);
        let mapped = match payload.remove("event") {
            Some(Value::String(name)) => name,
            _ => analytics.event_name(event).to_string(),
        };
        let tracking_id = match payload.remove("trackingId") {
            Some(Value::String(id)) => id,
            _ => analytics.tracking_id.clone(),
        };

        let telemetry = TelemetryEvent {
            event: mapped,
            timestamp,
            tracking_id,
            payload,
        };

        tracing::debug!(event, mapped = %telemetry.event, "event tracked");
        self.notify(OutboundMessage::Analytics(telemetry));
    }

    /// Report an error with context.
    ///
    /// Also tracked as an `errors` event. The caller decides whether to
    /// propagate the error afterwards.
    pub fn report_error(
        &self,
        context: &str,
        error: &dyn fmt::Display,
        session_id: Option<&str>,
    ) -> ErrorReport {
        let report = ErrorReport {
            message: context.to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
            session_id: session_id.map(str::to_string),
        };

        tracing::error!(
            context,
            error = %report.error,
            session_id = ?report.session_id,
            "widget error"
        );

        self.track(
            ERRORS_EVENT,
            serde_json::to_value(&report).unwrap_or(Value::Null),
        );
        self.notify(OutboundMessage::Error(report.clone()));
        report
    }
}
