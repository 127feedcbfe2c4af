//! Wire protocol for the Re Cards lobby server.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`RoomCode`], [`RoomStatus`], [`PublicRoomState`], ...):
//!   the redacted room view, the only room representation that ever
//!   leaves the server.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`AckResult`],
//!   [`Envelope`]): named events with optional acknowledgement ids.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the room
//! registry. It knows nothing about connections or room bookkeeping.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<ClientEvent>) → Room registry
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{
    AckHeader, AckResult, ClientEvent, CreateRoom, Envelope, Inbound, JoinRoom, Outbound,
    ServerEvent, SetReady,
};
pub use types::{
    FailureReason, PublicMatch, PublicPlayer, PublicRoomState, RoomCode,
    RoomStatus,
};
