//! # Re Cards
//!
//! Real-time lobby server for two-player Re Cards matches.
//!
//! Clients connect over WebSocket, open or join a room by its short code,
//! mark themselves ready, and receive the authoritative match start once
//! both players are ready. The server keeps every room in memory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recards::prelude::*;
//!
//! # async fn start() -> Result<(), RecardsError> {
//! let server = RecardsServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, DEFAULT_PORT, ServerConfig};
pub use error::RecardsError;
pub use server::{RecardsServer, RecardsServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{ConfigError, RecardsError, RecardsServer, RecardsServerBuilder, ServerConfig};
    pub use recards_protocol::{
        AckResult, ClientEvent, FailureReason, PublicRoomState, RoomCode, RoomStatus, ServerEvent,
    };
    pub use recards_room::RoomRegistry;
    pub use recards_transport::OriginPolicy;
}
