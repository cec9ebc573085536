//! Player authentication and presence tracking for unotable.
//!
//! 1. **Authentication**: turning a bearer token into an [`Identity`]
//!    ([`Authenticator`] trait, [`JwtAuthenticator`]).
//! 2. **Presence**: which connection currently speaks for a player, and
//!    how long a dropped player has been gone ([`SessionManager`]).
//!
//! A dropped player keeps their seat for a grace period. The server's
//! sweeper calls [`SessionManager::expire_stale`] and removes expired
//! players from their rooms.
//!
//! ```text
//! Room Layer (above)     ← seats, hands, turn order
//!     ↕
//! Session Layer (this)   ← identity, live connection, grace period
//!     ↕
//! Transport (below)      ← ConnectionId
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod manager;
mod session;

pub use auth::{Authenticator, Claims, Identity, JwtAuthenticator};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};
