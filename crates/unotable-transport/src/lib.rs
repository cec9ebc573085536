//! Transport abstraction layer for unotable.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the network protocol, plus the [`UpgradeRequest`] captured while the
//! connection was being established (request path and bearer token).
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// WebSocket close codes the server emits.
///
/// Clients treat [`POLICY`](close_code::POLICY) as "session expired,
/// log in again"; every other abnormal close is retried.
pub mod close_code {
    /// Normal closure (e.g. replaced by a newer login).
    pub const NORMAL: u16 = 1000;
    /// The endpoint does not serve this kind of request.
    pub const UNSUPPORTED: u16 = 1003;
    /// Authentication failed or the token expired.
    pub const POLICY: u16 = 1008;
}

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What the client asked for when it opened the connection.
///
/// The token comes from the percent-decoded `token` query parameter,
/// falling back to an `Authorization: Bearer ...` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Request path, e.g. `/games/SOLO/ws`.
    pub path: String,
    /// Bearer token presented by the client.
    pub token: Option<String>,
}

impl UpgradeRequest {
    /// Builds a request from the raw URI parts and an optional header token.
    pub fn from_parts(
        path: &str,
        query: Option<&str>,
        header_token: Option<&str>,
    ) -> Self {
        let query_token = query.and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
        });
        let token = query_token
            .as_deref()
            .or(header_token)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);

        Self {
            path: path.to_owned(),
            token,
        }
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive messages.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends data to the remote peer. UTF-8 payloads go out as text frames.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection with a specific close code and reason.
    async fn close_with(
        &self,
        code: u16,
        reason: &str,
    ) -> Result<(), Self::Error>;

    /// Closes the connection normally.
    async fn close(&self) -> Result<(), Self::Error> {
        self.close_with(close_code::NORMAL, "").await
    }

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the upgrade request this connection was opened with.
    fn request(&self) -> &UpgradeRequest;
}
