//! WebSocket push endpoint.
//!
//! `GET /ws?token=<token>` (or a bearer header) upgrades to a WebSocket. An
//! authenticated socket is registered in the [`PushRegistry`] under its user
//! (or the relay) and receives directed events; every socket receives
//! broadcasts. Frames are `{"event": <name>, "data": <payload>}`.
//!
//! A newer connection for the same recipient replaces the older one; the
//! older socket is closed once its directed queue is dropped.
//!
//! [`PushRegistry`]: reverie_core::push::PushRegistry

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};

use reverie_types::event::{PushEvent, RecipientId};

use crate::http::error::AppError;
use crate::http::extractors::auth::{bearer_token, resolve_principal};
use crate::http::extractors::query::SocketQuery;
use crate::state::{AppState, RelayStatus};

/// Incoming command from a WebSocket client.
///
/// Unknown or malformed messages are logged and ignored.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    /// Keep-alive ping. Server responds with `{"type":"pong"}`.
    Ping,
    /// Health report from the relay. Ignored from any other socket.
    RelayStatus {
        status: String,
        #[serde(default)]
        message: Option<String>,
    },
}

/// Upgrade an HTTP request to a push socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let presented = match query.token.filter(|t| !t.is_empty()) {
        Some(token) => Some(token),
        None => bearer_token(&headers)?,
    };

    let recipient = match presented {
        Some(token) => Some(resolve_principal(&state, &token).await?.recipient()),
        None => None,
    };

    Ok(ws.on_upgrade(move |socket| handle_ws_connection(socket, state, recipient)))
}

/// Receive the next directed event, or wait forever on an anonymous socket.
async fn next_directed(rx: &mut Option<mpsc::Receiver<PushEvent>>) -> Option<PushEvent> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_event(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &PushEvent,
) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => ws_sender.send(Message::Text(json.into())).await.is_ok(),
        Err(err) => {
            tracing::warn!(event = event.name(), "Failed to serialize PushEvent: {err}");
            true
        }
    }
}

/// Core WebSocket connection handler.
///
/// Multiplexes directed events, broadcasts and incoming client frames in a
/// single task with `tokio::select!`.
async fn handle_ws_connection(socket: WebSocket, state: AppState, recipient: Option<RecipientId>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let registration = recipient.map(|r| (r, state.push.register(r)));
    let (connection_id, mut directed_rx) = match registration {
        Some((r, (id, rx))) => {
            tracing::debug!(recipient = %r, connection_id = %id, "push socket registered");
            (Some(id), Some(rx))
        }
        None => (None, None),
    };
    let mut broadcast_rx = state.push.subscribe();

    loop {
        tokio::select! {
            directed = next_directed(&mut directed_rx) => {
                match directed {
                    Some(event) => {
                        if !send_event(&mut ws_sender, &event).await {
                            break;
                        }
                    }
                    // Replaced by a newer connection for the same recipient.
                    None => break,
                }
            }

            broadcast_result = broadcast_rx.recv() => {
                match broadcast_result {
                    Ok(event) => {
                        if !send_event(&mut ws_sender, &event).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "WebSocket subscriber lagged, skipping {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        process_command(&text, &mut ws_sender, &state, recipient).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Binary and protocol-level ping/pong frames are handled by axum.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if let (Some(r), Some(id)) = (recipient, connection_id) {
        let removed = state.push.unregister(r, id);
        tracing::debug!(recipient = %r, connection_id = %id, removed, "push socket closed");
    } else {
        tracing::debug!("anonymous push socket closed");
    }
}

/// Parse and process a single command from the WebSocket client.
async fn process_command(
    text: &str,
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    state: &AppState,
    recipient: Option<RecipientId>,
) {
    let cmd: WsCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(err) => {
            tracing::warn!(error = %err, "Ignoring malformed WebSocket command");
            return;
        }
    };

    match cmd {
        WsCommand::Ping => {
            let pong = r#"{"type":"pong"}"#;
            if ws_sender.send(Message::Text(pong.into())).await.is_err() {
                tracing::debug!("Failed to send pong (client disconnecting)");
            }
        }
        WsCommand::RelayStatus { status, message } => {
            if recipient != Some(RecipientId::Relay) {
                tracing::warn!("relay_status received from a non-relay socket, ignoring");
                return;
            }
            tracing::info!(%status, message = ?message, "relay status update");
            *state.relay_status.write().await = Some(RelayStatus {
                status,
                message,
                updated_at: chrono::Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert!(matches!(
            serde_json::from_str::<WsCommand>(r#"{"type":"ping"}"#).unwrap(),
            WsCommand::Ping
        ));

        match serde_json::from_str::<WsCommand>(
            r#"{"type":"relay_status","status":"connected","message":"polling"}"#,
        )
        .unwrap()
        {
            WsCommand::RelayStatus { status, message } => {
                assert_eq!(status, "connected");
                assert_eq!(message.as_deref(), Some("polling"));
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(serde_json::from_str::<WsCommand>(r#"{"type":"dance"}"#).is_err());
    }

    #[tokio::test]
    async fn test_anonymous_socket_has_no_directed_events() {
        let mut rx: Option<mpsc::Receiver<PushEvent>> = None;
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            next_directed(&mut rx),
        )
        .await;
        assert!(waited.is_err());
    }
}
