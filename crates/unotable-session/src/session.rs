//! Session types: the server's record of a player's presence.

use std::time::Instant;

use unotable_protocol::PlayerId;
use unotable_transport::ConnectionId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a disconnected player keeps their seat
    /// before they are treated as having left.
    ///
    /// Default: 30 seconds.
    pub reconnect_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The current state of a player's session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapsed)──→ Expired
///       ↑                            │
///       └─────────(connect)──────────┘
/// ```
#[derive(Debug, Clone)]
pub enum SessionState {
    /// A live socket speaks for this player.
    Connected,

    /// The socket dropped at the given instant.
    Disconnected { since: Instant },

    /// Grace period elapsed. Removed on the next cleanup.
    Expired,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single player's presence on the server.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,

    /// Display name from the latest token.
    pub display_name: String,

    pub state: SessionState,

    /// The connection that most recently authenticated as this player.
    /// Older sockets for the same player are stale.
    pub connection: ConnectionId,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected)
    }
}
