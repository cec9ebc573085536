//! Outbound server events.
//!
//! Every event is a JSON object with an `event` discriminator. Field
//! names are consumed directly by the browser client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Card, Color, GameSettings, PlayerId, PlayerState, RoomCode};

/// One open table in the lobby listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyEntry {
    pub game_id: RoomCode,
    pub host_name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub buy_in: f64,
    pub is_active: bool,
}

/// Roster fields shared by the join/create events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub host_id: PlayerId,
    /// Seat order, which is also turn order.
    pub players: Vec<PlayerId>,
    pub player_names: BTreeMap<PlayerId, String>,
    pub player_states: BTreeMap<PlayerId, PlayerState>,
}

/// What just happened, attached to a `game_update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEventKind {
    PlayCard,
    Reverse,
    Skip,
    WildColorPick,
    WildColorPickDraw4,
    Draw4,
    Draw2,
    DrawCard,
    Win,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    #[serde(rename = "type")]
    pub kind: GameEventKind,
    pub player_id: PlayerId,
    pub affected_player_id: Option<PlayerId>,
}

impl GameEvent {
    pub fn new(kind: GameEventKind, player_id: PlayerId) -> Self {
        Self {
            kind,
            player_id,
            affected_player_id: None,
        }
    }

    pub fn affecting(mut self, player: PlayerId) -> Self {
        self.affected_player_id = Some(player);
        self
    }
}

/// Every event the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    LobbyUpdate {
        games: Vec<LobbyEntry>,
    },
    System {
        message: String,
    },
    GameCreated {
        game_id: RoomCode,
        creator: PlayerId,
        #[serde(flatten)]
        roster: Roster,
        message: String,
    },
    GameJoined {
        game_id: RoomCode,
        #[serde(flatten)]
        roster: Roster,
    },
    PlayerJoined {
        game_id: RoomCode,
        #[serde(flatten)]
        roster: Roster,
        new_player_id: PlayerId,
        new_player_name: String,
        message: String,
    },
    PlayerLeft {
        player_id: PlayerId,
        player_name: String,
        host_id: PlayerId,
        message: String,
    },
    PlayerBackToLobby {
        player_states: BTreeMap<PlayerId, PlayerState>,
    },
    GameSettingsSaved {
        settings: GameSettings,
    },
    GameStarted {
        game_id: RoomCode,
    },
    /// Full per-recipient snapshot of a hand in progress.
    GameUpdate {
        game_id: RoomCode,
        current_active_color: Color,
        top_card: Card,
        current_player: PlayerId,
        hand: Vec<Card>,
        /// Other players' hand sizes. Excludes the recipient.
        card_counts: BTreeMap<PlayerId, usize>,
        player_states: BTreeMap<PlayerId, PlayerState>,
        direction: i8,
        game_event: Option<GameEvent>,
    },
    /// A hand ended without a card win.
    GameEnded {
        game_id: RoomCode,
        reason: String,
        winner: Option<PlayerId>,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}
