//! Integration tests for the server, gateway, and full connection flow.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use unotable::prelude::*;

// =========================================================================
// Mock authenticator
// =========================================================================

/// Uses the token as both player id and display name. The token
/// `expired` is treated as a stale login.
struct TestAuth;

impl Authenticator for TestAuth {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        if token == "expired" {
            return Err(SessionError::TokenExpired);
        }
        Ok(Identity {
            player_id: PlayerId::from(token),
            display_name: token.to_owned(),
        })
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const WAIT: Duration = Duration::from_secs(2);

fn test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".into(),
        ..ServerConfig::default()
    }
}

/// Starts a server on a random port and returns the address.
async fn start_server_with(
    config: ServerConfig,
    fixed_code: Option<&'static str>,
) -> String {
    let mut builder = UnotableServerBuilder::new().config(config);
    if let Some(code) = fixed_code {
        builder = builder.code_generator(move || code.to_string());
    }
    let server = builder
        .build(TestAuth, Arc::new(FreePlayLedger))
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_server() -> String {
    start_server_with(test_config(), Some("QZPD")).await
}

async fn connect_path(addr: &str, path: &str, token: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!(
        "ws://{addr}{path}?token={token}"
    ))
    .await
    .expect("should connect");
    ws
}

/// Connects as `token` and consumes the welcome sequence.
async fn login(addr: &str, token: &str) -> ClientWs {
    let mut ws = connect_path(addr, "/games/SOLO/ws", token).await;
    let lobby = recv(&mut ws).await;
    assert_eq!(lobby["event"], "lobby_update");
    let welcome = recv(&mut ws).await;
    assert_eq!(welcome["event"], "system");
    ws
}

async fn send(ws: &mut ClientWs, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("send");
}

async fn next_message(ws: &mut ClientWs) -> Message {
    tokio::time::timeout(WAIT, ws.next())
        .await
        .expect("timed out waiting for message")
        .expect("stream ended")
        .expect("websocket error")
}

/// Next JSON event.
async fn recv(ws: &mut ClientWs) -> Value {
    loop {
        match next_message(ws).await {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("json event");
            }
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// Skips events until one named `event` arrives.
async fn recv_event(ws: &mut ClientWs, event: &str) -> Value {
    loop {
        let value = recv(ws).await;
        if value["event"] == event {
            return value;
        }
    }
}

/// Expects the server to close the socket, returning the close code.
async fn recv_close(ws: &mut ClientWs) -> (CloseCode, String) {
    loop {
        match next_message(ws).await {
            Message::Close(Some(frame)) => {
                return (frame.code, frame.reason.as_str().to_owned());
            }
            Message::Close(None) => panic!("close without frame"),
            _ => continue,
        }
    }
}

fn lobby_codes(event: &Value) -> Vec<String> {
    event["games"]
        .as_array()
        .expect("games array")
        .iter()
        .map(|g| g["game_id"].as_str().unwrap_or_default().to_owned())
        .collect()
}

async fn create(ws: &mut ClientWs, max_players: usize, buy_in: f64) -> Value {
    send(
        ws,
        json!({
            "action": "create_game",
            "extra": { "max_players": max_players, "buy_in": buy_in, "is_private": false }
        }),
    )
    .await;
    recv_event(ws, "game_created").await
}

/// Host `h` creates QZPD and `p2` joins; both have seen `player_joined`.
async fn two_player_room(addr: &str) -> (ClientWs, ClientWs) {
    let mut host = login(addr, "h").await;
    create(&mut host, 4, 0.0).await;
    let mut guest = login(addr, "p2").await;
    send(&mut guest, json!({ "action": "join_game", "game_id": "QZPD" })).await;
    recv_event(&mut host, "player_joined").await;
    recv_event(&mut guest, "player_joined").await;
    (host, guest)
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test]
async fn test_connect_sends_lobby_then_welcome() {
    let addr = start_server().await;
    let mut ws = connect_path(&addr, "/games/SOLO/ws", "alice").await;

    let lobby = recv(&mut ws).await;
    assert_eq!(lobby["event"], "lobby_update");
    assert!(lobby["games"].as_array().unwrap().is_empty());

    let welcome = recv(&mut ws).await;
    assert_eq!(welcome["event"], "system");
    assert_eq!(welcome["message"], "Welcome alice. Connection Established.");
}

#[tokio::test]
async fn test_connect_wrong_path_closes_unsupported() {
    let addr = start_server().await;
    let mut ws = connect_path(&addr, "/games/DUO/ws", "alice").await;

    let (code, _) = recv_close(&mut ws).await;
    assert_eq!(code, CloseCode::Unsupported);
}

#[tokio::test]
async fn test_connect_expired_token_closes_policy() {
    let addr = start_server().await;
    let mut ws = connect_path(&addr, "/games/SOLO/ws", "expired").await;

    let (code, reason) = recv_close(&mut ws).await;
    assert_eq!(code, CloseCode::Policy);
    assert_eq!(reason, "session expired");
}

#[tokio::test]
async fn test_connect_without_token_rejected_before_upgrade() {
    let addr = start_server().await;
    let result =
        tokio_tungstenite::connect_async(format!("ws://{addr}/games/SOLO/ws"))
            .await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status().as_u16(), 403);
        }
        Err(other) => panic!("expected HTTP 403, got {other:?}"),
        Ok(_) => panic!("upgrade without token should fail"),
    }
}

#[tokio::test]
async fn test_duplicate_login_closes_older_socket() {
    let addr = start_server().await;
    let mut first = login(&addr, "alice").await;
    let _second = login(&addr, "alice").await;

    let (code, reason) = recv_close(&mut first).await;
    assert_eq!(code, CloseCode::Normal);
    assert_eq!(reason, "Logged in elsewhere");
}

#[tokio::test]
async fn test_multiple_connections_independent() {
    let addr = start_server().await;
    let mut a = login(&addr, "a").await;
    let mut b = login(&addr, "b").await;

    send(&mut a, json!({ "action": "status_check" })).await;
    assert_eq!(recv(&mut a).await["event"], "lobby_update");

    send(&mut b, json!({ "action": "status_check" })).await;
    assert_eq!(recv(&mut b).await["event"], "lobby_update");
}

// =========================================================================
// Bad input never closes the connection
// =========================================================================

#[tokio::test]
async fn test_malformed_json_reports_error() {
    let addr = start_server().await;
    let mut ws = login(&addr, "alice").await;

    ws.send(Message::text("not json")).await.unwrap();
    let err = recv(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert!(err["message"].as_str().unwrap().contains("malformed"));

    send(&mut ws, json!({ "action": "status_check" })).await;
    assert_eq!(recv(&mut ws).await["event"], "lobby_update");
}

#[tokio::test]
async fn test_unknown_action_reports_error() {
    let addr = start_server().await;
    let mut ws = login(&addr, "alice").await;

    send(&mut ws, json!({ "action": "fly_away" })).await;
    let err = recv(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["message"], "unknown action: fly_away");
}

#[tokio::test]
async fn test_join_room_not_found() {
    let addr = start_server().await;
    let mut ws = login(&addr, "alice").await;

    send(&mut ws, json!({ "action": "join_game", "game_id": "ZZZZ" })).await;
    let err = recv(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["message"], "Game ZZZZ not found");
}

#[tokio::test]
async fn test_turn_action_outside_room_reports_error() {
    let addr = start_server().await;
    let mut ws = login(&addr, "alice").await;

    send(
        &mut ws,
        json!({ "action": "process_turn", "extra": { "action": "draw_card_from_middle" } }),
    )
    .await;
    let err = recv(&mut ws).await;
    assert_eq!(err["event"], "error");
    assert_eq!(err["message"], "You are not in a game");
}

// =========================================================================
// Lobby and rooms
// =========================================================================

#[tokio::test]
async fn test_create_game_replies_game_created() {
    let addr = start_server().await;
    let mut host = login(&addr, "h").await;

    let created = create(&mut host, 4, 0.0).await;
    assert_eq!(created["game_id"], "QZPD");
    assert_eq!(created["creator"], "h");
    assert_eq!(created["host_id"], "h");
    assert_eq!(created["players"], json!(["h"]));
    assert_eq!(created["player_states"]["h"], "ready");
}

#[tokio::test]
async fn test_lobby_update_pushed_to_idle_clients() {
    let addr = start_server().await;
    let mut watcher = login(&addr, "w").await;
    let mut host = login(&addr, "h").await;
    create(&mut host, 4, 0.0).await;

    loop {
        let update = recv_event(&mut watcher, "lobby_update").await;
        let games = update["games"].as_array().unwrap();
        if let Some(entry) = games.iter().find(|g| g["game_id"] == "QZPD") {
            assert_eq!(entry["host_name"], "h");
            assert_eq!(entry["max_players"], 4);
            assert_eq!(entry["is_active"], true);
            break;
        }
    }
}

#[tokio::test]
async fn test_join_broadcasts_roster_of_two() {
    let addr = start_server().await;
    let mut host = login(&addr, "h").await;
    create(&mut host, 4, 0.0).await;

    let mut guest = login(&addr, "p2").await;
    send(&mut guest, json!({ "action": "join_game", "game_id": "qzpd" })).await;

    let joined = recv_event(&mut host, "player_joined").await;
    assert_eq!(joined["players"], json!(["h", "p2"]));
    assert_eq!(joined["new_player_id"], "p2");

    let joined = recv_event(&mut guest, "player_joined").await;
    assert_eq!(joined["players"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_leave_game_returns_lobby_without_room() {
    let addr = start_server().await;
    let mut host = login(&addr, "h").await;
    create(&mut host, 4, 0.0).await;

    send(&mut host, json!({ "action": "leave_game" })).await;
    let lobby = recv_event(&mut host, "lobby_update").await;
    assert!(!lobby_codes(&lobby).contains(&"QZPD".to_string()));

    send(&mut host, json!({ "action": "leave_game" })).await;
    let err = recv_event(&mut host, "error").await;
    assert_eq!(err["message"], "You are not in a game");
}

#[tokio::test]
async fn test_start_game_two_players_host_moves_first() {
    let addr = start_server().await;
    let (mut host, mut guest) = two_player_room(&addr).await;

    send(&mut host, json!({ "action": "start_game" })).await;

    for ws in [&mut host, &mut guest] {
        let started = recv_event(ws, "game_started").await;
        assert_eq!(started["game_id"], "QZPD");
        let update = recv_event(ws, "game_update").await;
        assert_eq!(update["current_player"], "h");
        assert_eq!(update["direction"], 1);
        assert_eq!(update["hand"].as_array().unwrap().len(), 7);
        assert_eq!(update["card_counts"].as_object().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_start_game_non_host_rejected() {
    let addr = start_server().await;
    let (_host, mut guest) = two_player_room(&addr).await;

    send(&mut guest, json!({ "action": "start_game" })).await;
    let err = recv_event(&mut guest, "error").await;
    assert_eq!(err["message"], "Only the host can do that");
}

#[tokio::test]
async fn test_out_of_turn_play_rejected_for_sender_only() {
    let addr = start_server().await;
    let (mut host, mut guest) = two_player_room(&addr).await;

    send(&mut host, json!({ "action": "start_game" })).await;
    recv_event(&mut host, "game_update").await;
    let update = recv_event(&mut guest, "game_update").await;
    let card = update["hand"][0].as_str().unwrap().to_owned();

    send(
        &mut guest,
        json!({ "action": "process_turn", "extra": { "action": "play_card", "card": card } }),
    )
    .await;
    let err = recv(&mut guest).await;
    assert_eq!(err["event"], "error");

    // The host's next event is its own draw, not the guest's rejection.
    send(
        &mut host,
        json!({ "action": "process_turn", "extra": { "action": "draw_card_from_middle" } }),
    )
    .await;
    let next = recv(&mut host).await;
    assert_eq!(next["event"], "game_update");
    assert_eq!(next["game_event"]["type"], "draw_card");
    assert_eq!(next["current_player"], "p2");
}

#[tokio::test]
async fn test_save_settings_broadcasts() {
    let addr = start_server().await;
    let (mut host, mut guest) = two_player_room(&addr).await;

    send(
        &mut host,
        json!({
            "action": "save_game_settings",
            "extra": { "settings": {
                "turn_timeout_seconds": 45,
                "stacking_mode": "aggressive",
                "afk_behavior": "skip",
                "max_afk_strikes": 2
            } }
        }),
    )
    .await;

    let saved = recv_event(&mut guest, "game_settings_saved").await;
    assert_eq!(saved["settings"]["turn_timeout_seconds"], 45);
    assert_eq!(saved["settings"]["stacking_mode"], "aggressive");
}

// =========================================================================
// Reconnection
// =========================================================================

#[tokio::test]
async fn test_resume_session_restores_hand() {
    let addr = start_server().await;
    let (mut host, mut guest) = two_player_room(&addr).await;

    send(&mut host, json!({ "action": "start_game" })).await;
    recv_event(&mut host, "game_update").await;
    let before = recv_event(&mut guest, "game_update").await;

    guest.close(None).await.ok();
    drop(guest);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut guest = login(&addr, "p2").await;
    send(
        &mut guest,
        json!({
            "action": "resume_session",
            "game_id": "QZPD",
            "extra": { "player_id": "p2" }
        }),
    )
    .await;

    let joined = recv_event(&mut guest, "game_joined").await;
    assert_eq!(joined["players"], json!(["h", "p2"]));
    let snapshot = recv_event(&mut guest, "game_update").await;
    assert_eq!(snapshot["hand"], before["hand"]);
    assert_eq!(snapshot["current_player"], "h");
    assert!(snapshot["game_event"].is_null());
}

#[tokio::test]
async fn test_resume_session_identity_mismatch() {
    let addr = start_server().await;
    let (_host, mut guest) = two_player_room(&addr).await;

    send(
        &mut guest,
        json!({
            "action": "resume_session",
            "game_id": "QZPD",
            "extra": { "player_id": "h" }
        }),
    )
    .await;
    let err = recv_event(&mut guest, "error").await;
    assert_eq!(err["message"], "Player id does not match your login");
}

#[tokio::test]
async fn test_disconnect_within_grace_keeps_seat() {
    let addr = start_server().await;
    let (mut host, guest) = two_player_room(&addr).await;

    drop(guest);

    // Nothing reaches the host: the seat is held, not released.
    let quiet = tokio::time::timeout(Duration::from_millis(300), host.next()).await;
    assert!(quiet.is_err(), "host should hear nothing, got {quiet:?}");
}

#[tokio::test]
async fn test_grace_expiry_releases_seat() {
    let config = ServerConfig {
        reconnect_grace_secs: 0,
        sweep_interval_ms: 20,
        ..test_config()
    };
    let addr = start_server_with(config, Some("QZPD")).await;
    let (mut host, guest) = two_player_room(&addr).await;

    drop(guest);

    let left = recv_event(&mut host, "player_left").await;
    assert_eq!(left["player_id"], "p2");
    assert_eq!(left["host_id"], "h");
}
