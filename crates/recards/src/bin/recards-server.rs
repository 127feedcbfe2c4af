//! Re Cards lobby server binary.
//!
//! Configured through `PORT`, `CLIENT_ORIGIN` and
//! `RECARDS_IDLE_TIMEOUT_SECS`; log verbosity through `RUST_LOG`.

use recards::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), RecardsError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let origin = config.client_origin.clone();
    let server = RecardsServer::builder().config(config).build().await?;
    tracing::info!(addr = ?server.local_addr().ok(), %origin, "listening");

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
