use unotable_protocol::{ErrorKind, ProtocolError, RoomCode};
use unotable_rules::RuleError;

use crate::LedgerError;

/// Errors that can occur during room operations.
///
/// The `Display` text is sent to the client as-is.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Game {0} not found")]
    NotFound(RoomCode),

    #[error("Game {0} is full")]
    RoomFull(RoomCode),

    /// No unused room code could be generated.
    #[error("No game codes available, try again later")]
    CodeSpaceExhausted,

    #[error("Only the host can do that")]
    NotHost,

    #[error("You are not in a game")]
    NotInRoom,

    #[error("You are already in game {0}")]
    AlreadyInRoom(RoomCode),

    #[error("Player id does not match your login")]
    IdentityMismatch,

    #[error("All players must be ready")]
    NotReady,

    #[error("{0}")]
    InvalidOptions(String),

    /// The session is in a lifecycle state that doesn't allow this.
    #[error("{0}")]
    InvalidState(String),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The room's command channel is closed.
    #[error("Game {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::NotInRoom => ErrorKind::NotFound,
            Self::RoomFull(_) | Self::CodeSpaceExhausted => ErrorKind::Capacity,
            Self::AlreadyInRoom(_) | Self::InvalidState(_) | Self::NotReady => {
                ErrorKind::StateConflict
            }
            Self::NotHost | Self::IdentityMismatch | Self::InvalidOptions(_) => {
                ErrorKind::Validation
            }
            Self::Rule(e) => e.kind(),
            Self::Protocol(e) => e.kind(),
            Self::Ledger(e) => e.kind(),
            Self::Unavailable(_) => ErrorKind::Internal,
        }
    }
}
