//! WebSocket upgrade handler and per-connection receive loop.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};

use crate::AppState;

use super::events::{user_room_id, Ack, ClientCommand};
use super::hub::BroadcastHub;
use super::session::{ConnectionHandle, ConnectionId};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Lifecycle of one connection: register, loop over inbound commands and
/// outbound frames, unregister on any exit. Errors end this connection's
/// loop, never the process.
async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (handle, mut outbox) = ConnectionHandle::new();
    let conn_id = handle.id();
    state.hub.register(handle);

    loop {
        tokio::select! {
            // Client sends us a message.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let command: ClientCommand = match serde_json::from_str(&text) {
                            Ok(c) => c,
                            // Malformed and unknown commands are silently
                            // ignored; the connection stays open.
                            Err(_) => continue,
                        };
                        if !handle_command(&state.hub, conn_id, command) {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, conn_id = %conn_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // A frame queued for us by the hub (ack or broadcast).
            frame = outbox.recv() => {
                match frame {
                    Some(frame) => {
                        if ws_tx.send(Message::Text(frame.as_ref().into())).await.is_err() {
                            break;
                        }
                    }
                    // The hub dropped us after a failed send.
                    None => break,
                }
            }
        }
    }

    state.hub.unregister(conn_id);
    tracing::debug!(conn_id = %conn_id, "connection closed");
}

/// Apply one inbound command and queue its acknowledgement. Returns `false`
/// when the ack could not be queued, meaning the connection is already being
/// torn down.
fn handle_command(hub: &BroadcastHub, conn_id: ConnectionId, command: ClientCommand) -> bool {
    match command {
        ClientCommand::JoinRoom { room_id } => {
            if room_id.is_empty() {
                return true;
            }
            hub.join_room(conn_id, &room_id);
            hub.send_to(conn_id, &Ack::JoinedRoom { room_id }.into_value())
        }
        ClientCommand::LeaveRoom { room_id } => {
            if room_id.is_empty() {
                return true;
            }
            hub.leave_room(conn_id, &room_id);
            hub.send_to(conn_id, &Ack::LeftRoom { room_id }.into_value())
        }
        ClientCommand::JoinUserRoom { user_id } => {
            hub.join_room(conn_id, &user_room_id(user_id));
            hub.send_to(conn_id, &Ack::JoinedUserRoom { user_id }.into_value())
        }
    }
}
