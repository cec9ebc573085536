//! `UnotableServer` builder, accept loop and grace-period sweeper.
//!
//! This is the entry point for running a game server. It ties together
//! all the layers: transport → protocol → session → room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tokio::time::MissedTickBehavior;
use unotable_protocol::{Codec, JsonCodec, PlayerId};
use unotable_room::{CodeGenerator, Ledger, RoomError, SessionRegistry};
use unotable_session::{Authenticator, SessionManager};
use unotable_transport::{
    ConnectionId, Transport, TransportError, WebSocketTransport,
};

use crate::gateway::handle_connection;
use crate::{ServerConfig, ServerError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator, C: Codec, L: Ledger> {
    /// The only request path sockets may target.
    pub(crate) ws_path: String,
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) registry: SessionRegistry<L>,
    /// One-shot "you were replaced" signals, keyed by live connection.
    pub(crate) kicks: Mutex<HashMap<ConnectionId, oneshot::Sender<()>>>,
    pub(crate) auth: A,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use unotable::prelude::*;
///
/// let server = UnotableServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(JwtAuthenticator::new(b"secret"), Arc::new(FreePlayLedger))
///     .await?;
/// server.run().await
/// ```
pub struct UnotableServerBuilder {
    config: ServerConfig,
    code_generator: Option<CodeGenerator>,
}

impl UnotableServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            code_generator: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Overrides how room codes are generated.
    pub fn code_generator(
        mut self,
        generate: impl FnMut() -> String + Send + Sync + 'static,
    ) -> Self {
        self.code_generator = Some(Box::new(generate));
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build<A, L>(
        self,
        auth: A,
        ledger: Arc<L>,
    ) -> Result<UnotableServer<A, JsonCodec, L>, ServerError>
    where
        A: Authenticator,
        L: Ledger,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let mut registry =
            SessionRegistry::new(ledger, self.config.registry_config());
        if let Some(generate) = self.code_generator {
            registry = registry.with_code_generator(generate);
        }

        let state = Arc::new(ServerState {
            ws_path: self.config.ws_path(),
            sessions: Mutex::new(SessionManager::new(
                self.config.session_config(),
            )),
            registry,
            kicks: Mutex::new(HashMap::new()),
            auth,
            codec: JsonCodec,
        });

        Ok(UnotableServer {
            transport,
            state,
            sweep_interval: self.config.sweep_interval(),
        })
    }
}

impl Default for UnotableServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct UnotableServer<A: Authenticator, C: Codec, L: Ledger> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C, L>>,
    sweep_interval: Duration,
}

impl<A, C, L> UnotableServer<A, C, L>
where
    A: Authenticator,
    C: Codec,
    L: Ledger,
{
    /// Creates a new builder.
    pub fn builder() -> UnotableServerBuilder {
        UnotableServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops every
    /// room.
    ///
    /// Each accepted connection gets its own task. A background task
    /// releases the seats of players whose reconnection grace period ran
    /// out.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ServerError> {
        tracing::info!(path = %self.state.ws_path, "unotable server running");

        let sweeper = spawn_sweeper(Arc::clone(&self.state), self.sweep_interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    kind = ?e.kind(),
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(TransportError::UpgradeRejected(reason)) => {
                        tracing::debug!(%reason, "upgrade rejected");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("unotable server shutting down");
        sweeper.abort();
        self.state.registry.shutdown_all().await;
        Ok(())
    }
}

fn spawn_sweeper<A, C, L>(
    state: Arc<ServerState<A, C, L>>,
    every: Duration,
) -> tokio::task::JoinHandle<()>
where
    A: Authenticator,
    C: Codec,
    L: Ledger,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_expired(&state).await;
        }
    })
}

/// Treats every player whose grace period elapsed as having left.
async fn sweep_expired<A, C, L>(state: &ServerState<A, C, L>)
where
    A: Authenticator,
    C: Codec,
    L: Ledger,
{
    let expired = state.sessions.lock().await.expire_stale();
    if expired.is_empty() {
        return;
    }
    release_expired(state, &expired).await;
    state.sessions.lock().await.cleanup_expired();
}

/// Releases the seats of `expired` players who have not reconnected.
///
/// The session lock is held across each release so a reconnect either
/// lands first and keeps the seat, or waits until it is gone.
async fn release_expired<A, C, L>(
    state: &ServerState<A, C, L>,
    expired: &[PlayerId],
) where
    A: Authenticator,
    C: Codec,
    L: Ledger,
{
    for player_id in expired {
        let sessions = state.sessions.lock().await;
        if !sessions.is_expired(player_id) {
            tracing::debug!(%player_id, "reconnected before seat release");
            continue;
        }
        match state.registry.leave(player_id).await {
            Ok(code) => {
                tracing::info!(%player_id, %code, "seat released after grace period");
            }
            Err(RoomError::NotInRoom) => {}
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "failed to release seat");
            }
        }
        drop(sessions);
    }
}
