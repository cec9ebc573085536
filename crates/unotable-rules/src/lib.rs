//! Rules engine for unotable tables.
//!
//! A [`Table`] is one hand of the game: seats in join order, the draw
//! and discard piles, whose turn it is, and any pending wild colour
//! choice or draw penalty. It knows nothing about sockets or rooms.
//!
//! Every move goes through two steps, in the same shape as a
//! validate-then-apply game loop:
//!
//! 1. [`Table::validate`]: pure check, never mutates.
//! 2. [`Table::apply`]: validates, then mutates. A rejected move leaves
//!    the table untouched.
//!
//! After each mutation the owner calls [`Table::check_conservation`];
//! the number of cards in play never changes during a hand.

mod deck;
mod error;
mod table;
mod validate;
mod view;

pub use deck::{DECK_SIZE, HAND_SIZE, standard_deck};
pub use error::RuleError;
pub use table::{Direction, Layout, Phase, Table, TimeoutOutcome};
pub use view::TableView;
