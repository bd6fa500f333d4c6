//! WebSocket bridge to the hosting frame.

use std::sync::Arc;

use agentforce_core::{FrameOutbox, InboundMessage};
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::protocol;

/// Path the host connects to.
pub const HOST_PATH: &str = "/host";

/// Bridge handler state.
#[derive(Clone)]
pub struct HostBridgeState {
    /// Messages posted by the widget.
    pub outbox: Arc<FrameOutbox>,
    /// Where host messages are delivered.
    pub inbound: mpsc::UnboundedSender<InboundMessage>,
}

impl HostBridgeState {
    #[must_use]
    pub const fn new(
        outbox: Arc<FrameOutbox>,
        inbound: mpsc::UnboundedSender<InboundMessage>,
    ) -> Self {
        Self { outbox, inbound }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<HostBridgeState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: HostBridgeState) {
    let (mut sender, mut receiver) = socket.split();
    tracing::info!("host frame connected");

    // Replay history, then follow live messages.
    let mut outbound = state.outbox.history_plus_stream();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = outbound.next().await {
            let text = match protocol::encode(&msg) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to encode {} message: {e}", msg.kind());
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                break;
            }
        };

        match protocol::decode(&text) {
            Ok(Some(message)) => {
                if state.inbound.send(message).is_err() {
                    tracing::warn!("widget stopped listening for host messages");
                    break;
                }
            }
            Ok(None) => tracing::trace!("ignoring message not addressed to the widget"),
            Err(e) => tracing::warn!("Invalid host message: {e}"),
        }
    }

    send_task.abort();
    tracing::info!("host frame disconnected");
}

/// Router serving the bridge at [`HOST_PATH`].
///
/// # Example
/// ```ignore
/// let (tx, rx) = mpsc::unbounded_channel();
/// let app = host_bridge_router(outbox.clone(), tx);
/// axum::serve(listener, app).await?;
/// ```
#[must_use]
pub fn host_bridge_router(
    outbox: Arc<FrameOutbox>,
    inbound: mpsc::UnboundedSender<InboundMessage>,
) -> axum::Router {
    axum::Router::new()
        .route(HOST_PATH, axum::routing::get(ws_handler))
        .with_state(HostBridgeState::new(outbox, inbound))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentforce_core::{HostFrame, LifecycleState, OutboundMessage, WidgetState};
    use serde_json::Value;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    async fn spawn_bridge() -> (
        String,
        Arc<FrameOutbox>,
        mpsc::UnboundedReceiver<InboundMessage>,
    ) {
        let outbox = Arc::new(FrameOutbox::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let app = host_bridge_router(outbox.clone(), tx);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("ws://{addr}{HOST_PATH}"), outbox, rx)
    }

    fn state(minimized: bool) -> OutboundMessage {
        OutboundMessage::WidgetStateChanged(WidgetState {
            minimized,
            lifecycle: LifecycleState::Unauthenticated,
        })
    }

    async fn next_json<S>(ws: &mut S) -> Value
    where
        S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_str(msg.to_text().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_history_then_live_messages() {
        let (url, outbox, _rx) = spawn_bridge().await;
        outbox.post(state(true));

        let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let first = next_json(&mut ws).await;
        assert_eq!(first["type"], "WIDGET_STATE_CHANGED");
        assert_eq!(first["data"]["minimized"], true);

        outbox.post(state(false));
        let second = next_json(&mut ws).await;
        assert_eq!(second["data"]["minimized"], false);
    }

    #[tokio::test]
    async fn test_host_messages_are_forwarded() {
        let (url, _outbox, mut rx) = spawn_bridge().await;
        let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

        ws.send(WsMessage::Text("not json".to_string())).await.unwrap();
        ws.send(WsMessage::Text(r#"{"type":"PING"}"#.to_string()))
            .await
            .unwrap();
        ws.send(WsMessage::Text(
            r#"{"type":"MCI_THEME_CHANGE","theme":{"headerTitle":"Support"}}"#.to_string(),
        ))
        .await
        .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            InboundMessage::MciThemeChange { theme } => {
                assert_eq!(theme.header_title.as_deref(), Some("Support"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
