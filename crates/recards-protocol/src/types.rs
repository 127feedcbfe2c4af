//! Room types that travel on the wire.
//!
//! Everything here is part of the public room view: the redacted shape
//! clients see. Connection identifiers and timestamps never appear in
//! these types, so nothing internal can leak through serialization.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// RoomCode
// ---------------------------------------------------------------------------

/// The short, human-enterable code a room is known by (e.g. `X7F2K`).
///
/// Serialized as a plain string. Codes typed by a person are normalized
/// on the way in (surrounding whitespace dropped, upper-cased), so
/// `" x7f2k"` looks up the same room as `"X7F2K"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Creates a code from user or generator input, normalizing it.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RoomCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// Where a room is in its lifecycle.
///
/// ```text
///            both ready
///   Lobby ───────────────→ Playing
///     ↑                       │
///     └──── a player leaves ──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Accepting players and collecting ready flags.
    #[default]
    Lobby,
    /// A match is running.
    Playing,
}

impl RoomStatus {
    /// Returns `true` if the room accepts new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Lobby)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Playing => write!(f, "playing"),
        }
    }
}

// ---------------------------------------------------------------------------
// FailureReason
// ---------------------------------------------------------------------------

/// Why a client request was refused. A closed set; each variant is sent
/// as its snake_case name in `{ok:false, reason}` acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No live room has the given code.
    NotFound,
    /// The room already holds two players.
    RoomFull,
    /// The room is not in the lobby any more.
    AlreadyStarted,
    /// The requester is not a player of the room.
    NotInRoom,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::NotFound => "not_found",
            Self::RoomFull => "room_full",
            Self::AlreadyStarted => "already_started",
            Self::NotInRoom => "not_in_room",
        };
        f.write_str(reason)
    }
}

// ---------------------------------------------------------------------------
// Public room view
// ---------------------------------------------------------------------------

/// A player as other clients see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub name: String,
    pub ready: bool,
}

/// The redacted match view.
///
/// Matches currently carry no hidden information. Per-player secrets
/// (hands, decks) added later must be filtered per recipient before they
/// reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicMatch {
    /// Shape version of the match payload.
    pub schema_version: u32,
    /// Turn counter, starting at 1.
    pub turn: u32,
    /// Index into `players` of whose turn it is.
    pub active: usize,
    /// Shared randomness seed for client-side resolution.
    pub seed: u32,
}

/// The only representation of a room that is ever sent to clients.
///
/// ```json
/// { "code": "X7F2K", "status": "lobby",
///   "players": [{ "name": "Ana", "ready": false }],
///   "match": null }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicRoomState {
    pub code: RoomCode,
    pub status: RoomStatus,
    /// Players in join order.
    pub players: Vec<PublicPlayer>,
    /// `null` until a match starts.
    #[serde(rename = "match")]
    pub match_state: Option<PublicMatch>,
}
