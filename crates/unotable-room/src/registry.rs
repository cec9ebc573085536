//! Session registry: creates and destroys rooms and routes players.
//!
//! Holds a map of room code → [`RoomHandle`] and tracks which room each
//! player is seated in. A player holds at most one seat at a time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Mutex;
use unotable_protocol::{CreateOptions, PlayerId, RoomCode};

use crate::room::spawn_room;
use crate::{
    Ledger, LobbyBoard, Occupant, RoomAction, RoomError, RoomHandle,
    RoomInfo, RoomOptions,
};

/// Default bounded channel size for room command queues.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Default number of fresh codes tried before giving up.
const DEFAULT_MAX_CODE_ATTEMPTS: usize = 32;

/// Produces candidate room codes. Output that doesn't parse as a
/// [`RoomCode`] counts as a failed attempt.
pub type CodeGenerator = Box<dyn FnMut() -> String + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    pub max_code_attempts: usize,
    pub channel_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }
}

/// How a `join_game` was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Took a new seat.
    Joined,
    /// The player already held a seat there; it was re-bound.
    Resumed,
}

struct Inner {
    rooms: HashMap<RoomCode, RoomHandle>,
    player_rooms: HashMap<PlayerId, RoomCode>,
    /// Seats being taken while the buy-in is debited.
    pending: HashMap<PlayerId, RoomCode>,
    /// Codes handed to rooms that are still being created.
    reserved: HashSet<RoomCode>,
    generate: CodeGenerator,
}

impl Inner {
    /// The room the player is seated in or on their way into.
    fn seat_of(&self, player_id: &PlayerId) -> Option<&RoomCode> {
        self.player_rooms
            .get(player_id)
            .or_else(|| self.pending.get(player_id))
    }
}

/// Owns every live room.
///
/// The registry lock only guards the maps. Ledger calls and room
/// requests run with it released, so a slow buy-in in one room never
/// holds up another. While a buy-in is pending the player's seat and
/// any new room code stay reserved.
pub struct SessionRegistry<L: Ledger> {
    inner: Mutex<Inner>,
    ledger: Arc<L>,
    lobby: Arc<LobbyBoard>,
    config: RegistryConfig,
}

impl<L: Ledger> SessionRegistry<L> {
    pub fn new(ledger: Arc<L>, config: RegistryConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                rooms: HashMap::new(),
                player_rooms: HashMap::new(),
                pending: HashMap::new(),
                reserved: HashSet::new(),
                generate: Box::new(random_code),
            }),
            ledger,
            lobby: Arc::new(LobbyBoard::new()),
            config,
        }
    }

    /// Replaces the random room-code generator.
    pub fn with_code_generator(
        mut self,
        generate: impl FnMut() -> String + Send + Sync + 'static,
    ) -> Self {
        self.inner.get_mut().generate = Box::new(generate);
        self
    }

    pub fn lobby(&self) -> &Arc<LobbyBoard> {
        &self.lobby
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Creates a room with `host` as its only member.
    ///
    /// The code is reserved before the buy-in is taken, so a failed
    /// debit leaves nothing behind.
    pub async fn create(
        &self,
        host: Occupant,
        options: CreateOptions,
    ) -> Result<RoomCode, RoomError> {
        let options = RoomOptions::try_from(options)?;
        let player_id = host.player_id.clone();

        let code = {
            let mut inner = self.inner.lock().await;
            if let Some(code) = inner.seat_of(&player_id) {
                return Err(RoomError::AlreadyInRoom(code.clone()));
            }
            let Some(code) = self.fresh_code(&mut inner) else {
                tracing::warn!(
                    attempts = self.config.max_code_attempts,
                    "room code space exhausted"
                );
                return Err(RoomError::CodeSpaceExhausted);
            };
            inner.reserved.insert(code.clone());
            inner.pending.insert(player_id.clone(), code.clone());
            code
        };

        let debited = self.ledger.debit(&player_id, options.buy_in).await;

        let mut inner = self.inner.lock().await;
        inner.reserved.remove(&code);
        inner.pending.remove(&player_id);
        debited?;

        let handle = spawn_room(
            code.clone(),
            host,
            options,
            Arc::clone(&self.ledger),
            Arc::clone(&self.lobby),
            self.config.channel_size,
        );
        inner.rooms.insert(code.clone(), handle);
        inner.player_rooms.insert(player_id.clone(), code.clone());

        tracing::info!(
            %code,
            host = %player_id,
            max_players = options.max_players,
            buy_in = options.buy_in,
            private = options.is_private,
            rooms = inner.rooms.len(),
            "room created"
        );
        Ok(code)
    }

    /// Seats `occupant` in room `code`, or resumes their seat if they
    /// already hold one there.
    pub async fn join(
        &self,
        occupant: Occupant,
        code: &RoomCode,
    ) -> Result<JoinKind, RoomError> {
        let player_id = occupant.player_id.clone();

        let (handle, resuming) = {
            let mut inner = self.inner.lock().await;
            if let Some(current) = inner.seat_of(&player_id) {
                if current != code || inner.pending.contains_key(&player_id) {
                    return Err(RoomError::AlreadyInRoom(current.clone()));
                }
                (room(&inner, code)?, true)
            } else {
                let handle = room(&inner, code)?;
                inner.pending.insert(player_id.clone(), code.clone());
                (handle, false)
            }
        };

        if resuming {
            handle.resume(occupant).await?;
            return Ok(JoinKind::Resumed);
        }

        let seated = self.take_seat(&handle, occupant, code).await;

        let mut inner = self.inner.lock().await;
        inner.pending.remove(&player_id);
        let buy_in = seated?;
        if !inner.rooms.contains_key(code) {
            // Torn down while the seat was being taken.
            drop(inner);
            self.refund(&player_id, buy_in).await;
            return Err(RoomError::NotFound(code.clone()));
        }
        inner.player_rooms.insert(player_id, code.clone());
        Ok(JoinKind::Joined)
    }

    /// Checks the room still takes players, debits the buy-in and seats
    /// the occupant. Returns the buy-in taken.
    async fn take_seat(
        &self,
        handle: &RoomHandle,
        occupant: Occupant,
        code: &RoomCode,
    ) -> Result<f64, RoomError> {
        let info = handle.info().await?;
        if !info.status.is_joinable() {
            return Err(RoomError::InvalidState(format!(
                "Game {code} has already started"
            )));
        }
        if info.is_full() {
            return Err(RoomError::RoomFull(code.clone()));
        }

        let player_id = occupant.player_id.clone();
        self.ledger.debit(&player_id, info.buy_in).await?;
        if let Err(e) = handle.join(occupant).await {
            self.refund(&player_id, info.buy_in).await;
            return Err(e);
        }
        Ok(info.buy_in)
    }

    /// Explicit resume handshake. `claimed` must be the authenticated
    /// player, and they must still hold a seat in `code`.
    pub async fn resume(
        &self,
        occupant: Occupant,
        code: &RoomCode,
        claimed: &PlayerId,
    ) -> Result<(), RoomError> {
        if *claimed != occupant.player_id {
            return Err(RoomError::IdentityMismatch);
        }
        let handle = {
            let inner = self.inner.lock().await;
            let handle = room(&inner, code)?;
            if inner.player_rooms.get(claimed) != Some(code) {
                return Err(RoomError::NotInRoom);
            }
            handle
        };
        handle.resume(occupant).await
    }

    /// Removes the player from their room, tearing the room down when
    /// they were the last member.
    pub async fn leave(&self, player_id: &PlayerId) -> Result<RoomCode, RoomError> {
        let (code, handle) = {
            let mut inner = self.inner.lock().await;
            let code = inner
                .player_rooms
                .remove(player_id)
                .ok_or(RoomError::NotInRoom)?;
            let handle = inner.rooms.get(&code).cloned();
            (code, handle)
        };
        let Some(handle) = handle else {
            return Ok(code);
        };

        let closed = match handle.leave(player_id.clone()).await {
            Ok(outcome) => outcome.closed(),
            Err(RoomError::Unavailable(_)) => true,
            Err(e) => return Err(e),
        };
        if closed {
            // The code stays taken until the listing is retired.
            let _ = handle.shutdown().await;
            self.lobby.retire(&code).await;
            let mut inner = self.inner.lock().await;
            inner.rooms.remove(&code);
            tracing::info!(%code, rooms = inner.rooms.len(), "room destroyed");
        }
        Ok(code)
    }

    /// The player's connection dropped. Their seat is kept.
    pub async fn detach(
        &self,
        player_id: &PlayerId,
        conn: unotable_transport::ConnectionId,
    ) {
        let handle = {
            let inner = self.inner.lock().await;
            inner
                .player_rooms
                .get(player_id)
                .and_then(|code| inner.rooms.get(code))
                .cloned()
        };
        if let Some(handle) = handle {
            let _ = handle.detach(player_id.clone(), conn).await;
        }
    }

    /// Forwards a seated player's action to their room.
    pub async fn act(
        &self,
        player_id: &PlayerId,
        action: RoomAction,
    ) -> Result<(), RoomError> {
        let handle = {
            let inner = self.inner.lock().await;
            let code = inner
                .player_rooms
                .get(player_id)
                .ok_or(RoomError::NotInRoom)?;
            room(&inner, code)?
        };
        handle.act(player_id.clone(), action).await
    }

    /// The room the player is seated in, if any.
    pub async fn room_of(&self, player_id: &PlayerId) -> Option<RoomCode> {
        self.inner.lock().await.player_rooms.get(player_id).cloned()
    }

    pub async fn info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        let handle = room(&*self.inner.lock().await, code)?;
        handle.info().await
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.inner.lock().await.rooms.len()
    }

    /// Tells every room to stop.
    pub async fn shutdown_all(&self) {
        let rooms: Vec<(RoomCode, RoomHandle)> = {
            let mut inner = self.inner.lock().await;
            inner.player_rooms.clear();
            inner.rooms.drain().collect()
        };
        for (code, handle) in rooms {
            let _ = handle.shutdown().await;
            self.lobby.retire(&code).await;
        }
    }

    fn fresh_code(&self, inner: &mut Inner) -> Option<RoomCode> {
        for _ in 0..self.config.max_code_attempts {
            let candidate = (inner.generate)();
            match RoomCode::parse(&candidate) {
                Ok(code)
                    if !inner.rooms.contains_key(&code)
                        && !inner.reserved.contains(&code) =>
                {
                    return Some(code);
                }
                Ok(_) => {
                    tracing::trace!(%candidate, "room code collision");
                }
                Err(e) => {
                    tracing::debug!(%candidate, error = %e, "generated code rejected");
                }
            }
        }
        None
    }

    async fn refund(&self, player_id: &PlayerId, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        if let Err(e) = self.ledger.credit(player_id, amount).await {
            tracing::error!(player = %player_id, amount, error = %e, "buy-in refund failed");
        }
    }
}

fn room(inner: &Inner, code: &RoomCode) -> Result<RoomHandle, RoomError> {
    inner
        .rooms
        .get(code)
        .cloned()
        .ok_or_else(|| RoomError::NotFound(code.clone()))
}

fn random_code() -> String {
    let mut rng = rand::rng();
    (0..RoomCode::LEN)
        .map(|_| {
            let i = rng.random_range(0..RoomCode::ALPHABET.len());
            char::from(RoomCode::ALPHABET[i])
        })
        .collect()
}
