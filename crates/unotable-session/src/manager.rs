//! Session manager: tracks which connection speaks for each player.
//!
//! The manager is a plain struct with no locking of its own. The server
//! wraps it in a `tokio::sync::Mutex` and shares it between connection
//! tasks and the grace-period sweeper.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use unotable_protocol::PlayerId;
use unotable_transport::ConnectionId;

use crate::{Identity, Session, SessionConfig, SessionError, SessionState};

/// Manages all player sessions on the server.
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Binds `identity` to `connection`.
    ///
    /// Returns the previous connection when it was still live, so the
    /// caller can close it ("logged in elsewhere"). Reconnecting within
    /// the grace period, or after expiry but before cleanup, simply
    /// revives the session.
    pub fn connect(
        &mut self,
        identity: Identity,
        connection: ConnectionId,
    ) -> Option<ConnectionId> {
        let Identity {
            player_id,
            display_name,
        } = identity;

        match self.sessions.get_mut(&player_id) {
            Some(session) => {
                let replaced = (session.is_connected()
                    && session.connection != connection)
                    .then_some(session.connection);
                if matches!(session.state, SessionState::Disconnected { .. }) {
                    tracing::info!(%player_id, "player reconnected");
                }
                session.state = SessionState::Connected;
                session.connection = connection;
                session.display_name = display_name;
                replaced
            }
            None => {
                tracing::info!(%player_id, %connection, "session created");
                self.sessions.insert(
                    player_id.clone(),
                    Session {
                        player_id,
                        display_name,
                        state: SessionState::Connected,
                        connection,
                    },
                );
                None
            }
        }
    }

    /// Marks the player as disconnected, starting the grace period.
    ///
    /// Only the player's current connection may do this. Returns
    /// `Ok(false)` when `connection` has already been replaced.
    pub fn disconnect(
        &mut self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> Result<bool, SessionError> {
        let session = self
            .sessions
            .get_mut(player_id)
            .ok_or_else(|| SessionError::NotFound(player_id.clone()))?;

        if session.connection != connection {
            return Ok(false);
        }

        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };
        tracing::info!(%player_id, "player disconnected, grace period started");
        Ok(true)
    }

    /// Whether `connection` is the live connection for `player_id`.
    pub fn is_current(
        &self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> bool {
        self.sessions.get(player_id).is_some_and(|s| {
            s.is_connected() && s.connection == connection
        })
    }

    /// Marks every session whose grace period has elapsed as expired and
    /// returns their player ids.
    pub fn expire_stale(&mut self) -> Vec<PlayerId> {
        let grace = Duration::from_secs(self.config.reconnect_grace_secs);
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = &session.state {
                if since.elapsed() > grace {
                    session.state = SessionState::Expired;
                    expired.push(session.player_id.clone());
                    tracing::info!(
                        player_id = %session.player_id,
                        "session expired (grace period elapsed)"
                    );
                }
            }
        }

        expired
    }

    /// Whether the player's grace period ran out with no reconnect since.
    pub fn is_expired(&self, player_id: &PlayerId) -> bool {
        self.sessions
            .get(player_id)
            .is_some_and(|s| matches!(s.state, SessionState::Expired))
    }

    /// Removes all expired sessions.
    pub fn cleanup_expired(&mut self) {
        self.sessions
            .retain(|_, session| !matches!(session.state, SessionState::Expired));
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
