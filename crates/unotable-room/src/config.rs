use std::fmt;

use unotable_protocol::CreateOptions;

use crate::RoomError;

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a game session.
///
/// ```text
/// Waiting ──start_game──→ InProgress ──win / end_game──→ Ended
///    ↑                                                     │
///    └───────────────────back_to_lobby─────────────────────┘
/// ```
///
/// - **Waiting**: accepting joins, settings and readiness changes.
/// - **InProgress**: a hand is being played. Only turn actions from the
///   current player and leaves are accepted.
/// - **Ended**: the hand is over. The first `back_to_lobby` resets the
///   room to `Waiting` with the roster intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Waiting,
    InProgress,
    Ended,
}

impl SessionStatus {
    /// Returns `true` if new players may join.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Ended => write!(f, "ENDED"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomOptions
// ---------------------------------------------------------------------------

/// Validated options a room is created with. Fixed for the room's life.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomOptions {
    pub max_players: usize,
    pub buy_in: f64,
    pub is_private: bool,
}

impl RoomOptions {
    pub const MIN_PLAYERS: usize = 2;
    pub const MAX_PLAYERS: usize = 10;
}

impl TryFrom<CreateOptions> for RoomOptions {
    type Error = RoomError;

    fn try_from(opts: CreateOptions) -> Result<Self, Self::Error> {
        if !(Self::MIN_PLAYERS..=Self::MAX_PLAYERS).contains(&opts.max_players)
        {
            return Err(RoomError::InvalidOptions(format!(
                "max_players must be between {} and {}",
                Self::MIN_PLAYERS,
                Self::MAX_PLAYERS
            )));
        }
        if !opts.buy_in.is_finite() || opts.buy_in < 0.0 {
            return Err(RoomError::InvalidOptions(
                "buy_in must be zero or more".into(),
            ));
        }
        Ok(Self {
            max_players: opts.max_players,
            buy_in: opts.buy_in,
            is_private: opts.is_private,
        })
    }
}
