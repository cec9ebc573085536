//! Wire protocol for unotable.
//!
//! This crate defines the "language" that browsers and the server speak:
//!
//! - **Inbound** ([`ClientEnvelope`] → [`ClientAction`]): the
//!   `{action, game_id?, extra?}` envelope and its typed interpretation.
//! - **Outbound** ([`ServerEvent`]): every event the server pushes,
//!   discriminated by an `event` field.
//! - **Domain values** ([`Card`], [`Color`], [`GameSettings`],
//!   [`PlayerId`], [`RoomCode`]): shared by the rules engine and rooms.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes ↔ types.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientAction) → Room (game state)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod actions;
mod card;
mod codec;
mod error;
mod events;
mod settings;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use actions::{ClientAction, ClientEnvelope, CreateOptions, TurnAction};
pub use card::{Card, Color, Value};
pub use codec::{Codec, JsonCodec};
pub use error::{ErrorKind, ProtocolError};
pub use events::{
    GameEvent, GameEventKind, LobbyEntry, Roster, ServerEvent,
};
pub use settings::{AfkBehavior, GameSettings, StackingMode};
pub use types::{PlayerId, PlayerState, Recipient, RoomCode};
