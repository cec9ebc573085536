//! Per-player snapshot of a table.

use std::collections::BTreeMap;

use unotable_protocol::{Card, Color, PlayerId};

use crate::Table;

/// What one player is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub active_color: Color,
    pub top_card: Card,
    pub current_player: PlayerId,
    /// The viewer's own hand.
    pub hand: Vec<Card>,
    /// Hand sizes of everyone else still in rotation.
    pub card_counts: BTreeMap<PlayerId, usize>,
    pub direction: i8,
}

impl Table {
    /// Builds the snapshot `viewer` receives. Other hands appear only as
    /// counts.
    pub fn view_for(&self, viewer: &PlayerId) -> TableView {
        let hand = self
            .hand(viewer)
            .map(<[Card]>::to_vec)
            .unwrap_or_default();
        let card_counts = self
            .seats
            .iter()
            .filter(|s| s.active && &s.player != viewer)
            .map(|s| (s.player.clone(), s.hand.len()))
            .collect();

        TableView {
            active_color: self.active_color,
            top_card: self.top,
            current_player: self.current_player().clone(),
            hand,
            card_counts,
            direction: self.direction.as_i8(),
        }
    }
}
