//! Unified error type for the unotable server.

use unotable_protocol::{ErrorKind, ProtocolError};
use unotable_room::RoomError;
use unotable_session::SessionError;
use unotable_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, expired token).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Config(_) => ErrorKind::Internal,
            Self::Protocol(e) => e.kind(),
            Self::Session(e) => e.kind(),
            Self::Room(e) => e.kind(),
        }
    }
}
