//! Rejections produced by the rules engine.
//!
//! Messages are shown to the player verbatim.

use unotable_protocol::{Card, Color, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("This hand is over")]
    HandOver,

    #[error("You are not seated at this table")]
    NotSeated,

    #[error("You have forfeited this hand")]
    Forfeited,

    #[error("It's not your turn")]
    NotYourTurn,

    #[error("You don't have {0}")]
    CardNotInHand(Card),

    #[error("Cannot play {card} on {top} (active color {active})")]
    IllegalPlay { card: Card, top: Card, active: Color },

    #[error("Choose a color for your wild card first")]
    ColorChoicePending,

    #[error("No wild card is waiting for a color")]
    NoPendingWild,

    #[error("That color choice doesn't match the wild card played")]
    WrongColorAction,

    #[error("Choose one of R, B, G, Y")]
    InvalidColor,

    #[error("Stack a draw card or draw {penalty} cards")]
    MustStackOrDraw { penalty: u32 },

    #[error("At least {min} players are needed, got {got}")]
    NotEnoughPlayers { min: usize, got: usize },

    #[error("table invariant violated: {0}")]
    Invariant(String),
}

impl RuleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HandOver | Self::NotEnoughPlayers { .. } => {
                ErrorKind::StateConflict
            }
            Self::Invariant(_) => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}
