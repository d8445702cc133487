use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;

use realtime_gateway::config::Config;
use realtime_gateway::gateway::hub::BroadcastHub;
use realtime_gateway::AppState;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Helper: start an actual TCP server for WebSocket testing.
/// Returns (addr, state). The server runs in the background.
async fn start_ws_server() -> (SocketAddr, AppState) {
    let state = AppState {
        hub: Arc::new(BroadcastHub::new()),
        config: Arc::new(Config { port: 0 }),
    };
    let app = realtime_gateway::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Helper: open a WebSocket connection to the gateway.
async fn connect(addr: SocketAddr) -> WsStream {
    let url = format!("ws://{addr}/ws");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Helper: send one JSON frame.
async fn send_json(ws: &mut WsStream, payload: serde_json::Value) {
    ws.send(tungstenite::Message::Text(payload.to_string().into()))
        .await
        .expect("send frame");
}

/// Helper: read the next text frame as JSON, with a timeout.
async fn read_json(ws: &mut WsStream) -> serde_json::Value {
    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("ws read error");
    let text = msg.into_text().expect("not text");
    serde_json::from_str(&text).expect("parse frame")
}

/// Helper: assert that no frame arrives within a short window.
async fn assert_silent(ws: &mut WsStream) {
    let result = time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "expected no frame, got {result:?}");
}

/// Helper: join a room and consume the acknowledgement.
async fn join_room(ws: &mut WsStream, room_id: &str) {
    send_json(
        ws,
        serde_json::json!({ "command": "join_room", "room_id": room_id }),
    )
    .await;
    let ack = read_json(ws).await;
    assert_eq!(ack["event"], "joined_room");
    assert_eq!(ack["room_id"], room_id);
}

/// Helper: wait until the hub observes a disconnect cleanup.
async fn wait_for_member_count(state: &AppState, room_id: &str, expected: usize) {
    for _ in 0..50 {
        if state.hub.member_count(room_id) == expected {
            return;
        }
        time::sleep(Duration::from_millis(100)).await;
    }
    panic!(
        "room {room_id} never reached {expected} members (now {})",
        state.hub.member_count(room_id)
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_ok() {
    let (addr, _state) = start_ws_server().await;

    let resp = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("health request");
    assert_eq!(resp.status(), http::StatusCode::OK);

    let body: serde_json::Value = resp.json().await.expect("parse health response");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn room_broadcast_reaches_members_and_only_members() {
    let (addr, state) = start_ws_server().await;

    let mut x = connect(addr).await;
    let mut y = connect(addr).await;
    let mut z = connect(addr).await;

    join_room(&mut x, "course_7").await;
    join_room(&mut y, "course_7").await;
    join_room(&mut z, "course_8").await;

    let event = serde_json::json!({
        "event": "rating_updated",
        "course_id": 7,
        "new_rating": 4.5
    });
    assert_eq!(state.hub.broadcast_to_room(&event, "course_7"), 2);

    assert_eq!(read_json(&mut x).await, event);
    assert_eq!(read_json(&mut y).await, event);
    assert_silent(&mut z).await;
}

#[tokio::test]
async fn join_user_room_derives_user_room() {
    let (addr, state) = start_ws_server().await;

    let mut x = connect(addr).await;
    send_json(
        &mut x,
        serde_json::json!({ "command": "join_user_room", "user_id": 42 }),
    )
    .await;

    let ack = read_json(&mut x).await;
    assert_eq!(
        ack,
        serde_json::json!({ "event": "joined_user_room", "user_id": 42 })
    );

    let event = serde_json::json!({
        "event": "assignment_graded",
        "assignment_id": 5,
        "course_id": 12,
        "score": 88,
        "feedback": "Good work",
        "status": "graded"
    });
    assert_eq!(state.hub.broadcast_to_room(&event, "user_42"), 1);
    assert_eq!(read_json(&mut x).await, event);
}

#[tokio::test]
async fn leave_room_acks_and_stops_delivery() {
    let (addr, state) = start_ws_server().await;

    let mut x = connect(addr).await;
    join_room(&mut x, "course_7").await;

    send_json(
        &mut x,
        serde_json::json!({ "command": "leave_room", "room_id": "course_7" }),
    )
    .await;
    let ack = read_json(&mut x).await;
    assert_eq!(
        ack,
        serde_json::json!({ "event": "left_room", "room_id": "course_7" })
    );

    // Last member left, so the room is gone and broadcasts find nobody.
    assert_eq!(state.hub.room_count(), 0);
    assert_eq!(
        state
            .hub
            .broadcast_to_room(&serde_json::json!({"event": "rating_updated"}), "course_7"),
        0
    );
    assert_silent(&mut x).await;
}

#[tokio::test]
async fn abrupt_disconnect_cascades_through_rooms() {
    let (addr, state) = start_ws_server().await;

    let mut x = connect(addr).await;
    let mut y = connect(addr).await;

    join_room(&mut x, "course_7").await;
    send_json(
        &mut x,
        serde_json::json!({ "command": "join_user_room", "user_id": 42 }),
    )
    .await;
    assert_eq!(read_json(&mut x).await["event"], "joined_user_room");

    join_room(&mut y, "course_7").await;
    assert_eq!(state.hub.member_count("course_7"), 2);

    // Drop x without a close handshake.
    drop(x);
    wait_for_member_count(&state, "course_7", 1).await;
    assert_eq!(state.hub.member_count("user_42"), 0);

    // Subsequent broadcasts reach only y.
    let event = serde_json::json!({ "event": "rating_updated", "course_id": 7 });
    assert_eq!(state.hub.broadcast_to_room(&event, "course_7"), 1);
    assert_eq!(read_json(&mut y).await, event);
    assert_eq!(state.hub.broadcast_to_room(&event, "user_42"), 0);
}

#[tokio::test]
async fn malformed_commands_are_ignored_and_connection_survives() {
    let (addr, _state) = start_ws_server().await;

    let mut x = connect(addr).await;

    // Not JSON at all.
    x.send(tungstenite::Message::Text("not json".into()))
        .await
        .expect("send garbage");
    // Unknown command.
    send_json(&mut x, serde_json::json!({ "command": "dance" })).await;
    // Known command with a missing field.
    send_json(&mut x, serde_json::json!({ "command": "join_room" })).await;
    // Empty room id.
    send_json(
        &mut x,
        serde_json::json!({ "command": "join_room", "room_id": "" }),
    )
    .await;

    // No error frames, no acks, and the connection still works.
    assert_silent(&mut x).await;
    join_room(&mut x, "course_7").await;
}

#[tokio::test]
async fn rejoining_the_same_room_keeps_a_single_membership() {
    let (addr, state) = start_ws_server().await;

    let mut x = connect(addr).await;
    join_room(&mut x, "course_7").await;
    join_room(&mut x, "course_7").await;

    assert_eq!(state.hub.member_count("course_7"), 1);

    // One broadcast, one delivery.
    let event = serde_json::json!({ "event": "rating_updated", "course_id": 7 });
    assert_eq!(state.hub.broadcast_to_room(&event, "course_7"), 1);
    assert_eq!(read_json(&mut x).await, event);
    assert_silent(&mut x).await;
}

#[tokio::test]
async fn explicit_close_unregisters_the_connection() {
    let (addr, state) = start_ws_server().await;

    let mut x = connect(addr).await;
    join_room(&mut x, "course_7").await;
    assert_eq!(state.hub.connection_count(), 1);

    x.close(None).await.expect("close");
    wait_for_member_count(&state, "course_7", 0).await;
    assert_eq!(state.hub.connection_count(), 0);
    assert_eq!(state.hub.room_count(), 0);
}
