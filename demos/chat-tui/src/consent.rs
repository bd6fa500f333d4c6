//! Consent "window" for a terminal.
//!
//! The authorization URL is shown in the transcript; the user opens it in
//! a browser and pastes the redirect URL back with `/code <url>`.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use agentforce_core::{
    CallbackPayload, ConsentCallback, ConsentError, ConsentLauncher, ConsentWindow,
};
use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::mpsc;

use crate::app::UiEvent;

/// Turn a pasted redirect URL into a callback.
///
/// # Errors
/// Returns a message when the URL is invalid or carries neither a code
/// nor an error.
pub fn parse_redirect(redirect: &str) -> Result<ConsentCallback, String> {
    let url = Url::parse(redirect.trim()).map_err(|e| format!("invalid URL: {e}"))?;
    let origin = url.origin().ascii_serialization();
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    let payload = if let Some(error) = param("error") {
        let description = param("error_description").unwrap_or_default();
        CallbackPayload::OauthError {
            error: if description.is_empty() {
                error
            } else {
                format!("{error}: {description}")
            },
        }
    } else if let Some(code) = param("code") {
        CallbackPayload::OauthCode {
            code,
            state: param("state").unwrap_or_default(),
        }
    } else {
        return Err("redirect URL carries no code".to_string());
    };

    Ok(ConsentCallback { origin, payload })
}

struct Pending {
    tx: mpsc::UnboundedSender<ConsentCallback>,
    closed: Arc<AtomicBool>,
}

/// Launcher that routes consent through the transcript.
pub struct TerminalConsent {
    events: mpsc::UnboundedSender<UiEvent>,
    pending: Mutex<Option<Pending>>,
}

impl TerminalConsent {
    pub fn new(events: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self {
            events,
            pending: Mutex::new(None),
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Option<Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a pasted redirect URL to the waiting flow.
    ///
    /// # Errors
    /// Returns a message when no flow is waiting or the URL is unusable.
    pub fn complete(&self, redirect: &str) -> Result<(), String> {
        let callback = parse_redirect(redirect)?;
        let pending = self.pending();
        let Some(p) = pending.as_ref() else {
            return Err("no authorization in progress".to_string());
        };
        p.tx.send(callback)
            .map_err(|_| "authorization already finished".to_string())
    }

    /// Abandon the waiting flow.
    pub fn cancel(&self) -> bool {
        match self.pending().take() {
            Some(p) => {
                p.closed.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}

struct TerminalWindow {
    rx: mpsc::UnboundedReceiver<ConsentCallback>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl ConsentWindow for TerminalWindow {
    async fn recv(&mut self) -> Option<ConsentCallback> {
        self.rx.recv().await
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.rx.close();
    }
}

#[async_trait]
impl ConsentLauncher for TerminalConsent {
    async fn open(&self, url: &str) -> Result<Box<dyn ConsentWindow>, ConsentError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        *self.pending() = Some(Pending {
            tx,
            closed: closed.clone(),
        });
        self.events
            .send(UiEvent::ConsentRequested(url.to_string()))
            .map_err(|_| ConsentError::Unavailable("terminal is gone".to_string()))?;
        Ok(Box::new(TerminalWindow { rx, closed }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_redirect() {
        let cb = parse_redirect("http://localhost:3000/oauth-callback.html?code=abc&state=xyz")
            .unwrap();
        assert_eq!(cb.origin, "http://localhost:3000");
        match cb.payload {
            CallbackPayload::OauthCode { code, state } => {
                assert_eq!(code, "abc");
                assert_eq!(state, "xyz");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_redirect() {
        let cb = parse_redirect(
            "http://localhost:3000/cb?error=access_denied&error_description=user%20said%20no",
        )
        .unwrap();
        assert!(matches!(
            cb.payload,
            CallbackPayload::OauthError { ref error } if error == "access_denied: user said no"
        ));
    }

    #[test]
    fn test_parse_rejects_bare_url() {
        assert!(parse_redirect("http://localhost:3000/cb").is_err());
        assert!(parse_redirect("not a url").is_err());
    }

    #[tokio::test]
    async fn test_open_then_complete() {
        let (tx, mut events) = mpsc::unbounded_channel();
        let consent = TerminalConsent::new(tx);
        assert!(consent.complete("http://h/cb?code=1&state=2").is_err());

        let mut window = consent.open("https://idp/authorize").await.unwrap();
        assert!(matches!(
            events.recv().await,
            Some(UiEvent::ConsentRequested(ref url)) if url == "https://idp/authorize"
        ));

        consent.complete("http://h/cb?code=1&state=2").unwrap();
        assert!(window.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_cancel_closes_window() {
        let (tx, _events) = mpsc::unbounded_channel();
        let consent = TerminalConsent::new(tx);
        let mut window = consent.open("https://idp/authorize").await.unwrap();

        assert!(consent.cancel());
        assert!(window.is_closed());
        assert!(window.recv().await.is_none());
        assert!(!consent.cancel());
    }
}
