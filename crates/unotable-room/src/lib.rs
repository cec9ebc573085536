//! Game session management for unotable.
//!
//! Each game session runs as an isolated Tokio task (actor model) that
//! owns its roster, its table and its turn timer.
//!
//! # Key types
//!
//! - [`SessionRegistry`]: creates and destroys rooms, routes players
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`LobbyBoard`]: listing of open rooms with change notification
//! - [`Ledger`]: buy-in accounting seam
//! - [`SessionStatus`]: lifecycle state machine

#![allow(async_fn_in_trait)]

mod config;
mod error;
mod ledger;
mod lobby;
mod registry;
mod room;

pub use config::{RoomOptions, SessionStatus};
pub use error::RoomError;
pub use ledger::{FreePlayLedger, InMemoryLedger, Ledger, LedgerError};
pub use lobby::{LobbyBoard, LobbySnapshot, RoomInfo};
pub use registry::{CodeGenerator, JoinKind, RegistryConfig, SessionRegistry};
pub use room::{
    LeaveOutcome, Occupant, PlayerSender, RoomAction, RoomHandle,
};
