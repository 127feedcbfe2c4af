//! Room lifecycle management for Re Cards.
//!
//! Rooms are two-seat lobbies that turn into a match once both players
//! are ready. All rooms live in one [`RoomRegistry`], which also tracks
//! which room each connection sits in and where to deliver broadcasts.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates, joins, readies, starts and tears down rooms
//! - [`Room`]: one lobby and its pure state transitions
//! - [`Departure`]: what leaving did to a room
//! - [`RoomError`]: why a request was refused

mod code;
mod error;
mod registry;
mod room;

pub use code::{CODE_ALPHABET, CODE_LEN};
pub use error::RoomError;
pub use registry::{
    DEFAULT_GUEST_NAME, DEFAULT_HOST_NAME, Departure, PlayerSender, Requester, RoomRegistry,
};
pub use room::{MAX_PLAYERS, Match, Player, Room};
