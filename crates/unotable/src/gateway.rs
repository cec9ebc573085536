//! Per-connection gateway: path check, auth, and action routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Check the upgrade path and authenticate the bearer token
//!   2. Bind the identity to this connection (kicking an older one)
//!   3. Send the lobby snapshot and a welcome message
//!   4. Loop: forward room events and lobby updates out, route actions in

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use unotable_protocol::{
    ClientAction, ClientEnvelope, Codec, PlayerId, ServerEvent,
};
use unotable_room::{
    JoinKind, Ledger, Occupant, PlayerSender, RoomAction, RoomError,
};
use unotable_session::{Authenticator, Identity};
use unotable_transport::{
    Connection, ConnectionId, WebSocketConnection, close_code,
};

use crate::ServerError;
use crate::server::ServerState;

/// Drop guard that releases the connection's claim on the player.
///
/// If this connection was still the player's live one, the session enters
/// its grace period and the player's seat is detached (kept, not removed).
/// Since `Drop` is synchronous, the async cleanup runs in a spawned task.
struct ConnectionGuard<A: Authenticator, C: Codec, L: Ledger> {
    player_id: PlayerId,
    conn_id: ConnectionId,
    state: Arc<ServerState<A, C, L>>,
}

impl<A: Authenticator, C: Codec, L: Ledger> Drop for ConnectionGuard<A, C, L> {
    fn drop(&mut self) {
        let player_id = self.player_id.clone();
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.kicks.lock().await.remove(&conn_id);
            let current = state.sessions.lock().await.disconnect(&player_id, conn_id);
            match current {
                Ok(true) => state.registry.detach(&player_id, conn_id).await,
                Ok(false) => {
                    tracing::debug!(%player_id, %conn_id, "replaced connection closed");
                }
                Err(e) => {
                    tracing::debug!(%player_id, %conn_id, error = %e, "no session to release");
                }
            }
        });
    }
}

/// The authenticated caller on one connection.
struct Caller {
    player_id: PlayerId,
    name: String,
    conn_id: ConnectionId,
    events: PlayerSender,
}

impl Caller {
    fn occupant(&self) -> Occupant {
        Occupant {
            player_id: self.player_id.clone(),
            name: self.name.clone(),
            conn: self.conn_id,
            sender: self.events.clone(),
        }
    }

    fn notify(&self, event: ServerEvent) {
        // The receiver lives as long as the connection loop.
        let _ = self.events.send(event);
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C, L>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C, L>>,
) -> Result<(), ServerError>
where
    A: Authenticator,
    C: Codec,
    L: Ledger,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: path and token ---
    if conn.request().path != state.ws_path {
        tracing::debug!(%conn_id, path = %conn.request().path, "unsupported path");
        conn.close_with(close_code::UNSUPPORTED, "unsupported endpoint")
            .await?;
        return Ok(());
    }

    let token = conn.request().token.clone().unwrap_or_default();
    let identity = match state.auth.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "authentication failed");
            let _ = conn.close_with(close_code::POLICY, "session expired").await;
            return Err(e.into());
        }
    };

    // --- Step 2: bind identity ---
    let Identity {
        player_id,
        display_name,
    } = identity.clone();
    tracing::info!(%conn_id, %player_id, "player authenticated");

    let (kick_tx, mut kick_rx) = oneshot::channel();
    state.kicks.lock().await.insert(conn_id, kick_tx);
    let replaced = state.sessions.lock().await.connect(identity, conn_id);
    let _guard = ConnectionGuard {
        player_id: player_id.clone(),
        conn_id,
        state: Arc::clone(&state),
    };
    if let Some(old) = replaced {
        tracing::info!(%player_id, old = %old, new = %conn_id, "replacing older connection");
        if let Some(kick) = state.kicks.lock().await.remove(&old) {
            let _ = kick.send(());
        }
    }

    // --- Step 3: welcome ---
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let caller = Caller {
        player_id,
        name: display_name,
        conn_id,
        events: events_tx,
    };
    let mut lobby_rx = state.registry.lobby().subscribe();
    let snapshot = state.registry.lobby().snapshot().await;
    send_event(&conn, &state.codec, &snapshot.to_event()).await?;
    send_event(
        &conn,
        &state.codec,
        &ServerEvent::system(format!(
            "Welcome {}. Connection Established.",
            caller.name
        )),
    )
    .await?;

    // --- Step 4: message loop ---
    let mut lobby_open = true;
    loop {
        tokio::select! {
            _ = &mut kick_rx => {
                tracing::info!(player_id = %caller.player_id, %conn_id, "logged in elsewhere");
                let _ = conn.close_with(close_code::NORMAL, "Logged in elsewhere").await;
                break;
            }
            Some(event) = events_rx.recv() => {
                send_event(&conn, &state.codec, &event).await?;
            }
            update = lobby_rx.recv(), if lobby_open => match update {
                Ok(_) => {
                    // Seated players follow their room instead. Queued
                    // notifications may be stale, so send the board as it is now.
                    if state.registry.room_of(&caller.player_id).await.is_none() {
                        let snapshot = state.registry.lobby().snapshot().await;
                        send_event(&conn, &state.codec, &snapshot.to_event()).await?;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(player_id = %caller.player_id, skipped, "lobby updates lagged");
                }
                Err(broadcast::error::RecvError::Closed) => lobby_open = false,
            },
            received = conn.recv() => match received {
                Ok(Some(data)) => handle_message(&state, &caller, &data).await,
                Ok(None) => {
                    tracing::info!(player_id = %caller.player_id, %conn_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(player_id = %caller.player_id, error = %e, "recv error");
                    break;
                }
            },
        }
    }

    // _guard drops here → grace period starts.
    Ok(())
}

/// Decodes one inbound frame and dispatches it.
///
/// Nothing here closes the connection: every failure becomes an `error`
/// event for this caller only.
async fn handle_message<A, C, L>(
    state: &ServerState<A, C, L>,
    caller: &Caller,
    data: &[u8],
) where
    A: Authenticator,
    C: Codec,
    L: Ledger,
{
    let action = match state
        .codec
        .decode::<ClientEnvelope>(data)
        .and_then(ClientEnvelope::into_action)
    {
        Ok(action) => action,
        Err(e) => {
            tracing::debug!(player_id = %caller.player_id, error = %e, "rejected message");
            caller.notify(ServerEvent::error(e.to_string()));
            return;
        }
    };

    let name = action.name();
    tracing::debug!(player_id = %caller.player_id, action = name, "dispatching");
    if let Err(e) = dispatch(state, caller, action).await {
        tracing::debug!(
            player_id = %caller.player_id,
            action = name,
            kind = %e.kind(),
            error = %e,
            "action rejected"
        );
        caller.notify(ServerEvent::error(e.to_string()));
    }
}

async fn dispatch<A, C, L>(
    state: &ServerState<A, C, L>,
    caller: &Caller,
    action: ClientAction,
) -> Result<(), RoomError>
where
    A: Authenticator,
    C: Codec,
    L: Ledger,
{
    let registry = &state.registry;
    let room_action = match action {
        ClientAction::StatusCheck => {
            caller.notify(registry.lobby().snapshot().await.to_event());
            return Ok(());
        }
        ClientAction::CreateGame(options) => {
            registry.create(caller.occupant(), options).await?;
            return Ok(());
        }
        ClientAction::JoinGame { game_id } => {
            let kind = registry.join(caller.occupant(), &game_id).await?;
            if kind == JoinKind::Resumed {
                tracing::info!(player_id = %caller.player_id, code = %game_id, "seat resumed via join");
            }
            return Ok(());
        }
        ClientAction::ResumeSession { game_id, player_id } => {
            registry
                .resume(caller.occupant(), &game_id, &player_id)
                .await?;
            tracing::info!(%player_id, code = %game_id, "session resumed");
            return Ok(());
        }
        ClientAction::LeaveGame => {
            registry.leave(&caller.player_id).await?;
            caller.notify(registry.lobby().snapshot().await.to_event());
            return Ok(());
        }
        ClientAction::StartGame => RoomAction::Start,
        ClientAction::EndGame => RoomAction::End,
        ClientAction::BackToLobby => RoomAction::BackToLobby,
        ClientAction::SaveGameSettings(settings) => {
            RoomAction::SaveSettings(settings)
        }
        ClientAction::ProcessTurn(turn) => RoomAction::Turn(turn),
    };
    registry.act(&caller.player_id, room_action).await
}

async fn send_event<T: Serialize>(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &T,
) -> Result<(), ServerError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}
