//! Room, player and match data, and the pure lobby rules over them.
//!
//! Nothing in this module touches channels or the registry map; every
//! method here is a plain state transition or predicate on one room.

use std::time::SystemTime;

use rand::Rng;
use recards_protocol::{PublicMatch, PublicPlayer, PublicRoomState, RoomCode, RoomStatus};
use recards_transport::ConnectionId;

use crate::RoomError;

/// Players a room can hold.
pub const MAX_PLAYERS: usize = 2;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A connection seated in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// The owning connection.
    pub connection_id: ConnectionId,
    /// Client-chosen display name; not unique.
    pub name: String,
    /// Whether the player asked to start.
    pub ready: bool,
}

impl Player {
    pub(crate) fn new(connection_id: ConnectionId, name: String) -> Self {
        Self {
            connection_id,
            name,
            ready: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// Authoritative state of a running match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub schema_version: u32,
    pub turn: u32,
    /// Index into the room's players; the first to join moves first.
    pub active: usize,
    pub seed: u32,
}

impl Match {
    /// Current shape version of the match payload.
    pub const SCHEMA_VERSION: u32 = 1;

    /// Upper bound (exclusive) for match seeds.
    pub const SEED_BOUND: u32 = 1_000_000_000;

    fn new(seed: u32) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION,
            turn: 1,
            active: 0,
            seed,
        }
    }

    /// The view of this match every player may see.
    pub fn redacted(&self) -> PublicMatch {
        PublicMatch {
            schema_version: self.schema_version,
            turn: self.turn,
            active: self.active,
            seed: self.seed,
        }
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A lobby for two players and, once both are ready, their match.
///
/// Invariants kept by every method:
/// - at most [`MAX_PLAYERS`] players, in join order;
/// - a match exists exactly when the status is `Playing`.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    status: RoomStatus,
    players: Vec<Player>,
    match_state: Option<Match>,
    created_at: SystemTime,
}

impl Room {
    pub(crate) fn new(code: RoomCode, host: Player) -> Self {
        Self {
            code,
            status: RoomStatus::Lobby,
            players: vec![host],
            match_state: None,
            created_at: SystemTime::now(),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    /// Players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn match_state(&self) -> Option<&Match> {
        self.match_state.as_ref()
    }

    /// When the room was opened. Informational only.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Returns `true` if `connection` is one of the players.
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.players.iter().any(|p| p.connection_id == connection)
    }

    /// Checks whether a new player could be seated.
    ///
    /// The status is checked before capacity, so a running match always
    /// reports `AlreadyStarted` whatever the player count.
    pub fn check_joinable(&self) -> Result<(), RoomError> {
        if !self.status.is_joinable() {
            return Err(RoomError::AlreadyStarted(self.code.clone()));
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull(self.code.clone()));
        }
        Ok(())
    }

    /// Sets a player's ready flag. Returns `false` if `connection` has no
    /// seat in this room.
    pub fn set_ready(&mut self, connection: ConnectionId, ready: bool) -> bool {
        match self.players.iter_mut().find(|p| p.connection_id == connection) {
            Some(player) => {
                player.ready = ready;
                true
            }
            None => false,
        }
    }

    /// Returns `true` when the room is in the lobby with two players who
    /// are both ready.
    pub fn can_start(&self) -> bool {
        self.status == RoomStatus::Lobby
            && self.players.len() == MAX_PLAYERS
            && self.players.iter().all(|p| p.ready)
    }

    /// Moves the room into a match with a freshly drawn seed.
    ///
    /// Callers must check [`can_start`](Self::can_start) first; calling
    /// this twice replaces the running match.
    pub fn start_match(&mut self, rng: &mut impl Rng) {
        self.status = RoomStatus::Playing;
        self.match_state = Some(Match::new(rng.random_range(0..Match::SEED_BOUND)));
    }

    /// Redacted view sent to clients: no connection ids, no timestamps.
    pub fn public_state(&self) -> PublicRoomState {
        PublicRoomState {
            code: self.code.clone(),
            status: self.status,
            players: self
                .players
                .iter()
                .map(|p| PublicPlayer {
                    name: p.name.clone(),
                    ready: p.ready,
                })
                .collect(),
            match_state: self.match_state.as_ref().map(Match::redacted),
        }
    }

    pub(crate) fn seat(&mut self, player: Player) {
        debug_assert!(self.players.len() < MAX_PLAYERS);
        self.players.push(player);
    }

    /// Removes `connection`'s seat. A running match is abandoned: the room
    /// goes back to the lobby and everyone left must ready up again.
    ///
    /// Returns `None` if the connection had no seat, otherwise whether a
    /// match was aborted.
    pub(crate) fn unseat(&mut self, connection: ConnectionId) -> Option<bool> {
        let before = self.players.len();
        self.players.retain(|p| p.connection_id != connection);
        if self.players.len() == before {
            return None;
        }

        if self.status == RoomStatus::Playing {
            self.status = RoomStatus::Lobby;
            self.match_state = None;
            for player in &mut self.players {
                player.ready = false;
            }
            return Some(true);
        }
        Some(false)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
