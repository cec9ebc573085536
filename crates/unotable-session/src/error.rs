//! Error types for the session layer.

use unotable_protocol::{ErrorKind, PlayerId};

/// Errors that can occur during authentication and presence tracking.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was malformed, badly signed, or rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The token was valid once but its `exp` has passed.
    #[error("session expired")]
    TokenExpired,

    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthFailed(_) | Self::TokenExpired => ErrorKind::Auth,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }
}
