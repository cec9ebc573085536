//! Error types for the protocol layer, plus the error taxonomy shared by
//! every crate in the workspace.

use std::fmt;

/// Coarse classification of every error the server can report.
///
/// Each crate's error enum exposes a `kind()` that maps onto this, so the
/// gateway can decide between "tell the client" and "close the socket"
/// without matching on every concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad, missing, or expired credentials. Fatal to the connection.
    Auth,
    /// Illegal move or malformed request. Reported, never fatal.
    Validation,
    /// Unknown room code or seat.
    NotFound,
    /// Room full, code space exhausted, or insufficient funds.
    Capacity,
    /// Action not valid in the current lifecycle state.
    StateConflict,
    /// A bug or a broken invariant.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Capacity => "capacity",
            Self::StateConflict => "state_conflict",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Errors produced while encoding, decoding, or interpreting messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    #[error("malformed message: {0}")]
    Decode(serde_json::Error),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Maps this error onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encode(_) => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}
