//! # unotable
//!
//! Multiplayer shedding card game server.
//!
//! One WebSocket per player carries JSON actions in and JSON events out.
//! Each game session runs as its own actor; the gateway authenticates
//! sockets, keeps a player's seat through short disconnects, and routes
//! every action to the right session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use unotable::prelude::*;
//!
//! # async fn run() -> Result<(), ServerError> {
//! let config = ServerConfig::load()?;
//! let auth = JwtAuthenticator::new(config.jwt_secret.as_bytes());
//! let server = UnotableServer::<JwtAuthenticator, unotable_protocol::JsonCodec, FreePlayLedger>::builder()
//!     .config(config)
//!     .build(auth, Arc::new(FreePlayLedger))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod gateway;
mod server;

pub use config::{CONFIG_PATH_VAR, ServerConfig};
pub use error::ServerError;
pub use server::{UnotableServer, UnotableServerBuilder};

pub mod prelude {
    pub use crate::{ServerConfig, ServerError, UnotableServer, UnotableServerBuilder};
    pub use unotable_protocol::{ErrorKind, PlayerId, RoomCode, ServerEvent};
    pub use unotable_room::{FreePlayLedger, InMemoryLedger, Ledger, LedgerError};
    pub use unotable_session::{
        Authenticator, Identity, JwtAuthenticator, SessionError,
    };
}
