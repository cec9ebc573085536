use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use unotable::prelude::*;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = ServerConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    if config.jwt_secret.is_empty() {
        tracing::warn!("jwt_secret is empty; tokens signed with an empty key will be accepted");
    }

    let auth = JwtAuthenticator::new(config.jwt_secret.as_bytes());
    let server = UnotableServer::<JwtAuthenticator, unotable_protocol::JsonCodec, FreePlayLedger>::builder()
        .config(config)
        .build(auth, Arc::new(FreePlayLedger))
        .await?;
    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "listening");
    }

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
