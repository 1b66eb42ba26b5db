use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use hangar_core::events::{Envelope, HubEvent};
use hangar_core::ids::SessionId;
use hangar_store::sessions::SessionRepo;

use crate::server::AppState;
use crate::subscribers::ClientId;

/// Close code distinguishing "session not found" from ordinary closure.
pub const CLOSE_SESSION_NOT_FOUND: u16 = 4004;

/// WebSocket upgrade handler for `/ws/sessions/{sid}`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<SessionId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

async fn handle_socket(mut socket: WebSocket, session_id: SessionId, state: AppState) {
    // Hard precondition: no subscription is created for a missing session.
    if SessionRepo::new(state.store.clone()).get(&session_id).is_err() {
        let frame = CloseFrame {
            code: CLOSE_SESSION_NOT_FOUND,
            reason: format!("session {session_id} not found").into(),
        };
        let _ = socket.send(WsMessage::Close(Some(frame))).await;
        return;
    }

    let (client_id, rx) = state.registry.subscribe(&session_id);
    tracing::info!(session_id = %session_id, client_id = %client_id, "subscriber connected");

    run_connection(socket, &session_id, &client_id, rx).await;

    // Reached on every exit path: normal close, send error, receive error.
    state.registry.unsubscribe(&session_id, &client_id);
    tracing::info!(session_id = %session_id, client_id = %client_id, "subscriber disconnected");
}

/// Drive one connection until it closes or errors. The connection is
/// receive-for-liveness, send-for-events: the only inbound message with any
/// meaning is the text frame `ping`, answered with `pong`.
async fn run_connection(
    socket: WebSocket,
    session_id: &SessionId,
    client_id: &ClientId,
    mut rx: mpsc::Receiver<String>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Handshake goes to this connection only, never broadcast.
    let hello = Envelope::new(
        HubEvent::Connected,
        session_id.clone(),
        json!({ "message": format!("connected to session {session_id}") }),
    );
    let Ok(hello) = serde_json::to_string(&hello) else {
        return;
    };
    if ws_tx.send(WsMessage::Text(hello.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(text) => {
                        if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // Sender side dropped: this connection was pruned.
                    None => break,
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) if text.as_str() == "ping" => {
                        if ws_tx.send(WsMessage::Text("pong".into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!(session_id = %session_id, client_id = %client_id, %err, "websocket receive error");
                        break;
                    }
                }
            }
        }
    }
}
