//! Real-time channel: websocket endpoint pushing change events.
//!
//! One bidirectional connection per client, authenticated with the same
//! bearer token as the HTTP endpoints (the `jwt_auth` middleware accepts
//! it as an `access_token` query parameter since browsers cannot set
//! headers on an upgrade request).
//!
//! The server pushes [`ServerMessage`] JSON text frames: task upserts and
//! deletes from the all-clients stream, assignment notices from the
//! caller's per-user stream. No snapshot is sent on connect and missed
//! events are not replayed; clients load state over HTTP and reload in
//! full after a reconnect.
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Extension,
};
use boardsync_shared::auth::middleware::AuthContext;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::app::AppState;

/// `GET /api/v1/tasks/ws` — upgrade to the real-time channel
pub async fn task_events_ws(
    ws: WebSocketUpgrade,
    Extension(auth): Extension<AuthContext>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

async fn handle_socket(socket: WebSocket, state: AppState, auth: AuthContext) {
    let conn_id = Uuid::new_v4();
    tracing::info!(%conn_id, user_id = auth.user_id, "Client connected to real-time channel");

    // Subscribe before the first poll so no event published after the
    // handshake can be missed.
    let mut all_rx = state.hub.subscribe_all();
    let mut user_rx = state.hub.subscribe_user(auth.user_id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = all_rx.recv() => match event {
                Ok(msg) => {
                    let Ok(text) = msg.to_text() else { continue };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break; // client gone
                    }
                }
                // Lagged receivers lose overwritten events; the client
                // reconciles with a full reload, so keep streaming.
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%conn_id, skipped, "Client lagging on broadcast stream");
                }
                Err(RecvError::Closed) => break,
            },
            event = user_rx.recv() => match event {
                Ok(msg) => {
                    let Ok(text) = msg.to_text() else { continue };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                // Clients don't send application messages; answer pings,
                // drop everything else until the socket closes.
                Some(Ok(Message::Ping(payload))) => {
                    if sender.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sender.close().await;
    tracing::info!(%conn_id, user_id = auth.user_id, "Client disconnected from real-time channel");
}
