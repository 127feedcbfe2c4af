//! Transport abstraction layer for the Re Cards lobby server.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the network protocol carrying client events, plus the [`ConnectionId`]
//! that identifies each connected client to the room registry.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod origin;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use origin::OriginPolicy;
#[cfg(feature = "websocket")]
pub use websocket::{HANDSHAKE_TIMEOUT, WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier for a connection.
///
/// Unique per accepted connection for the lifetime of the process. A client
/// that reconnects gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
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
///
/// `send` and `recv` must be callable concurrently: a handler waiting in
/// `recv` must not stop a broadcast from being delivered through `send`.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends data to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Sends a WebSocket ping. A live peer answers with a pong, which
    /// counts as activity.
    async fn ping(&self) -> Result<(), Self::Error>;

    /// Time since the last frame of any kind arrived (or since the
    /// connection opened).
    fn idle_for(&self) -> std::time::Duration;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
