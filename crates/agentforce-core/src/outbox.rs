//! Broadcast + history outbox for hosting-frame messages.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{HostFrame, OutboundMessage};

/// Default number of messages kept for late subscribers.
const HISTORY_LEN: usize = 256;

/// Hosting-frame outbox.
///
/// Late subscribers (a bridge that connects after the widget started)
/// receive the retained history, then live messages.
pub struct FrameOutbox {
    history: RwLock<VecDeque<OutboundMessage>>,
    capacity: usize,
    sender: broadcast::Sender<OutboundMessage>,
}

impl Default for FrameOutbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameOutbox {
    /// Create an outbox with the default history length.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_LEN)
    }

    /// Create an outbox keeping at most `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            history: RwLock::new(VecDeque::with_capacity(capacity.min(32))),
            capacity,
            sender,
        }
    }

    /// Push a message to live listeners and history.
    pub fn push(&self, msg: OutboundMessage) {
        let _ = self.sender.send(msg.clone());

        let mut history = self
            .history
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        while history.len() >= self.capacity {
            if history.pop_front().is_none() {
                break;
            }
        }
        if self.capacity > 0 {
            history.push_back(msg);
        }
    }

    /// Receiver for live messages.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundMessage> {
        self.sender.subscribe()
    }

    /// Snapshot of the retained history.
    #[must_use]
    pub fn history(&self) -> Vec<OutboundMessage> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Stream that yields history first, then live messages.
    ///
    /// Messages a lagging subscriber missed are skipped.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, OutboundMessage> {
        let (history, rx) = (self.history(), self.subscribe());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }
}

impl HostFrame for FrameOutbox {
    fn post(&self, message: OutboundMessage) {
        self.push(message);
    }
}

/// Frame used when the widget is not embedded; everything is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedFrame;

impl HostFrame for DetachedFrame {
    fn post(&self, message: OutboundMessage) {
        tracing::trace!(kind = message.kind(), "no hosting frame attached, dropping");
    }

    fn is_embedded(&self) -> bool {
        false
    }
}
