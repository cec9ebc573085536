//! The lobby board: a listing of every live room, pushed to clients
//! that are not seated anywhere.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use unotable_protocol::{LobbyEntry, PlayerId, RoomCode, ServerEvent};

use crate::SessionStatus;

/// Room metadata, as published by the room actor.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub host_name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub buy_in: f64,
    pub is_private: bool,
    pub status: SessionStatus,
}

impl RoomInfo {
    /// Shown in the lobby: public and still waiting for players.
    pub fn is_listed(&self) -> bool {
        !self.is_private && self.status.is_joinable()
    }

    pub fn is_full(&self) -> bool {
        self.player_count >= self.max_players
    }

    pub fn to_entry(&self) -> LobbyEntry {
        LobbyEntry {
            game_id: self.code.clone(),
            host_name: self.host_name.clone(),
            player_count: self.player_count,
            max_players: self.max_players,
            buy_in: self.buy_in,
            is_active: self.status != SessionStatus::Ended,
        }
    }
}

/// A point-in-time copy of the board. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct LobbySnapshot {
    rooms: Arc<Vec<RoomInfo>>,
}

impl LobbySnapshot {
    /// Every room on the board, private and running ones included.
    pub fn rooms(&self) -> &[RoomInfo] {
        &self.rooms
    }

    /// Public rooms waiting for players, in room-code order.
    ///
    /// Lazy; call again to restart the iteration.
    pub fn public_waiting(&self) -> impl Iterator<Item = &RoomInfo> + '_ {
        self.rooms.iter().filter(|r| r.is_listed())
    }

    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::LobbyUpdate {
            games: self.public_waiting().map(RoomInfo::to_entry).collect(),
        }
    }
}

/// Shared registry of room listings with change notification.
///
/// Subscribers receive a fresh [`LobbySnapshot`] whenever a listing
/// changes. A lagging subscriber only misses intermediate snapshots.
#[derive(Debug)]
pub struct LobbyBoard {
    rooms: Mutex<BTreeMap<RoomCode, RoomInfo>>,
    tx: broadcast::Sender<LobbySnapshot>,
}

impl LobbyBoard {
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            rooms: Mutex::new(BTreeMap::new()),
            tx,
        }
    }

    /// Inserts or replaces a room's listing. No-op if nothing changed.
    pub async fn publish(&self, info: RoomInfo) {
        let mut rooms = self.rooms.lock().await;
        if rooms.get(&info.code) == Some(&info) {
            return;
        }
        tracing::trace!(code = %info.code, status = %info.status, "lobby listing updated");
        rooms.insert(info.code.clone(), info);
        self.notify(&rooms);
    }

    /// Drops a room's listing.
    pub async fn retire(&self, code: &RoomCode) {
        let mut rooms = self.rooms.lock().await;
        if rooms.remove(code).is_some() {
            tracing::trace!(%code, "lobby listing retired");
            self.notify(&rooms);
        }
    }

    pub async fn snapshot(&self) -> LobbySnapshot {
        let rooms = self.rooms.lock().await;
        Self::freeze(&rooms)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LobbySnapshot> {
        self.tx.subscribe()
    }

    fn notify(&self, rooms: &BTreeMap<RoomCode, RoomInfo>) {
        // No subscribers is fine.
        let _ = self.tx.send(Self::freeze(rooms));
    }

    fn freeze(rooms: &BTreeMap<RoomCode, RoomInfo>) -> LobbySnapshot {
        LobbySnapshot {
            rooms: Arc::new(rooms.values().cloned().collect()),
        }
    }
}

impl Default for LobbyBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(code: &str, is_private: bool, status: SessionStatus) -> RoomInfo {
        RoomInfo {
            code: RoomCode::parse(code).unwrap(),
            host_id: PlayerId::from("h"),
            host_name: "Host".into(),
            player_count: 1,
            max_players: 4,
            buy_in: 1.0,
            is_private,
            status,
        }
    }

    #[tokio::test]
    async fn test_snapshot_public_waiting_filters_private_and_running() {
        let board = LobbyBoard::new();
        board.publish(info("AAAA", false, SessionStatus::Waiting)).await;
        board.publish(info("BBBB", true, SessionStatus::Waiting)).await;
        board.publish(info("CCCC", false, SessionStatus::InProgress)).await;

        let snap = board.snapshot().await;
        let listed: Vec<_> =
            snap.public_waiting().map(|r| r.code.as_str()).collect();

        assert_eq!(listed, ["AAAA"]);
        assert_eq!(snap.rooms().len(), 3);
    }

    #[tokio::test]
    async fn test_public_waiting_is_restartable() {
        let board = LobbyBoard::new();
        board.publish(info("AAAA", false, SessionStatus::Waiting)).await;
        let snap = board.snapshot().await;

        assert_eq!(snap.public_waiting().count(), 1);
        assert_eq!(snap.public_waiting().count(), 1);
    }

    #[tokio::test]
    async fn test_publish_notifies_subscribers() {
        let board = LobbyBoard::new();
        let mut rx = board.subscribe();

        board.publish(info("AAAA", false, SessionStatus::Waiting)).await;

        let snap = rx.recv().await.unwrap();
        assert_eq!(snap.public_waiting().count(), 1);
    }

    #[tokio::test]
    async fn test_publish_unchanged_does_not_notify() {
        let board = LobbyBoard::new();
        board.publish(info("AAAA", false, SessionStatus::Waiting)).await;
        let mut rx = board.subscribe();

        board.publish(info("AAAA", false, SessionStatus::Waiting)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_retire_removes_listing() {
        let board = LobbyBoard::new();
        board.publish(info("AAAA", false, SessionStatus::Waiting)).await;

        board.retire(&RoomCode::parse("AAAA").unwrap()).await;

        assert!(board.snapshot().await.rooms().is_empty());
    }

    #[test]
    fn test_to_event_lists_entries() {
        let snap = LobbySnapshot {
            rooms: Arc::new(vec![info("AAAA", false, SessionStatus::Waiting)]),
        };
        match snap.to_event() {
            ServerEvent::LobbyUpdate { games } => {
                assert_eq!(games.len(), 1);
                assert_eq!(games[0].host_name, "Host");
                assert!(games[0].is_active);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
