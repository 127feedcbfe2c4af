//! `RecardsServer` builder and accept loop.
//!
//! This is the entry point for running the lobby server. It ties together
//! all the layers: transport → protocol → room registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use recards_protocol::JsonCodec;
use recards_room::RoomRegistry;
use recards_transport::{Transport, TransportError, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{RecardsError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// One lock guards the whole registry. A handler holds it for the full
/// sequence an event triggers, so no other client can observe a room
/// between, say, a ready flag flipping and the match starting.
pub(crate) struct ServerState {
    pub(crate) registry: Mutex<RoomRegistry>,
    pub(crate) codec: JsonCodec,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting a Re Cards server.
///
/// # Example
///
/// ```rust,no_run
/// use recards::prelude::*;
///
/// # async fn start() -> Result<(), RecardsError> {
/// let server = RecardsServer::builder()
///     .bind("127.0.0.1:3001")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RecardsServerBuilder {
    config: ServerConfig,
    registry: Option<RoomRegistry>,
}

impl RecardsServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `registry` instead of a fresh OS-seeded one. Handy for tests
    /// that need reproducible room codes.
    pub fn registry(mut self, registry: RoomRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<RecardsServer, RecardsError> {
        let transport = WebSocketTransport::bind_with_origin(
            &self.config.bind_addr,
            self.config.client_origin.clone(),
        )
        .await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(self.registry.unwrap_or_default()),
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
        });

        Ok(RecardsServer { transport, state })
    }
}

impl Default for RecardsServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Re Cards lobby server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RecardsServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl RecardsServer {
    /// Creates a new builder.
    pub fn builder() -> RecardsServerBuilder {
        RecardsServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task per accepted connection. Runs until the
    /// process is terminated or the future is dropped.
    pub async fn run(mut self) -> Result<(), RecardsError> {
        tracing::info!("Re Cards server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(TransportError::OriginRejected(origin)) => {
                    tracing::debug!(%origin, "refused connection from foreign origin");
                }
                Err(TransportError::HandshakeFailed(e)) => {
                    tracing::debug!(error = %e, "WebSocket handshake failed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
