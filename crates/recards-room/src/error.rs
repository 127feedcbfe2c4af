//! Error types for the room layer.

use recards_protocol::{FailureReason, RoomCode};
use recards_transport::ConnectionId;

/// Errors that can occur during room operations.
///
/// None of these are faults: each one maps to a [`FailureReason`] that is
/// handed back to the requesting client, whose own state is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The room already holds two players.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The room left the lobby; nobody can join until it returns.
    #[error("room {0} already started")]
    AlreadyStarted(RoomCode),

    /// The connection is not a player of this room.
    #[error("{0} is not in room {1}")]
    NotInRoom(ConnectionId, RoomCode),
}

impl RoomError {
    /// The reason reported to the client.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::NotFound(_) => FailureReason::NotFound,
            Self::RoomFull(_) => FailureReason::RoomFull,
            Self::AlreadyStarted(_) => FailureReason::AlreadyStarted,
            Self::NotInRoom(..) => FailureReason::NotInRoom,
        }
    }
}
