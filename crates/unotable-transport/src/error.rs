/// Socket-level failures. None of these are reported to the client;
/// the gateway logs them and drops the connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Writing a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding, accepting or upgrading a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The upgrade request was refused before the WebSocket handshake
    /// completed (for example, no bearer token was presented).
    #[error("upgrade rejected: {0}")]
    UpgradeRejected(String),
}
