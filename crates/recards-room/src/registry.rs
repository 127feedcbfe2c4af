//! The room registry: owns every room, every seat, and every channel.
//!
//! # Concurrency note
//!
//! `RoomRegistry` is not thread-safe by itself; it is a plain owned store.
//! The server wraps it in a single mutex and holds the lock for the whole
//! sequence an inbound event triggers (mutation, broadcasts, auto-start),
//! so each sequence is atomic with respect to every other client.

use std::collections::HashMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use recards_protocol::{Envelope, Outbound, PublicRoomState, RoomCode, ServerEvent};
use recards_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::code::random_code;
use crate::room::{Player, Room};
use crate::RoomError;

/// Outbound queue of one connection.
pub type PlayerSender = mpsc::UnboundedSender<Outbound>;

/// Name given to a room's creator who didn't pick one.
pub const DEFAULT_HOST_NAME: &str = "Player 1";

/// Name given to a joining player who didn't pick one.
pub const DEFAULT_GUEST_NAME: &str = "Player 2";

/// The connection asking to create or join a room, with the queue that
/// room broadcasts are delivered to.
#[derive(Debug, Clone)]
pub struct Requester {
    pub id: ConnectionId,
    pub sender: PlayerSender,
}

impl Requester {
    pub fn new(id: ConnectionId, sender: PlayerSender) -> Self {
        Self { id, sender }
    }
}

/// What happened to a connection's room when it left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// The connection wasn't seated anywhere; nothing changed.
    NotMember,
    /// It was the last player; the room is gone.
    RoomDeleted(RoomCode),
    /// The room lives on with the remaining player. `match_aborted` is
    /// set when a running match was discarded.
    RoomUpdated { code: RoomCode, match_aborted: bool },
}

/// Every live room, keyed by code.
///
/// Alongside the rooms it keeps two indexes in step with every mutation:
/// which room each connection sits in (at most one), and each seated
/// connection's outbound queue. A room's channel is exactly the queues of
/// its players.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
    memberships: HashMap<ConnectionId, RoomCode>,
    outboxes: HashMap<ConnectionId, PlayerSender>,
    rng: StdRng,
}

impl RoomRegistry {
    /// Creates an empty registry drawing randomness from the OS.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates an empty registry with a fixed seed, so codes and match
    /// seeds are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            outboxes: HashMap::new(),
            rng,
        }
    }

    // -- Lifecycle --------------------------------------------------------

    /// Opens a new lobby with the requester as its only, unready player,
    /// and enrolls the requester in the room's channel.
    ///
    /// A requester already seated elsewhere leaves that room first; the
    /// returned [`Departure`] says what became of it.
    pub fn create_room(
        &mut self,
        requester: Requester,
        name: Option<String>,
    ) -> (RoomCode, Departure) {
        let left = self.remove_player(requester.id);

        let code = self.unique_code();
        let name = name.unwrap_or_else(|| DEFAULT_HOST_NAME.to_string());
        let room = Room::new(code.clone(), Player::new(requester.id, name));
        self.rooms.insert(code.clone(), room);
        self.enroll(requester, &code);

        tracing::info!(room = %code, rooms = self.rooms.len(), "room created");
        (code, left)
    }

    /// Seats the requester in the lobby `code` and enrolls it in the
    /// room's channel.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`]: no such room
    /// - [`RoomError::AlreadyStarted`]: the room is playing
    /// - [`RoomError::RoomFull`]: both seats are taken
    ///
    /// On error nothing changes, including the requester's current seat.
    /// Joining the room one already sits in succeeds without changes.
    pub fn join_room(
        &mut self,
        code: &RoomCode,
        requester: Requester,
        name: Option<String>,
    ) -> Result<Departure, RoomError> {
        let room = self
            .rooms
            .get(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;

        if room.contains(requester.id) {
            self.outboxes.insert(requester.id, requester.sender);
            return Ok(Departure::NotMember);
        }

        if let Err(e) = room.check_joinable() {
            tracing::debug!(room = %code, connection = %requester.id, error = %e, "join refused");
            return Err(e);
        }

        // The target is a different room, so leaving can't delete it.
        let left = self.remove_player(requester.id);
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;

        let name = name.unwrap_or_else(|| DEFAULT_GUEST_NAME.to_string());
        room.seat(Player::new(requester.id, name));
        let players = room.player_count();
        tracing::info!(room = %code, connection = %requester.id, players, "player joined");

        self.enroll(requester, code);
        Ok(left)
    }

    /// Sets the ready flag of `connection` in room `code`.
    ///
    /// Nothing is broadcast; the caller announces the new state and then
    /// checks [`start_if_ready`](Self::start_if_ready).
    ///
    /// # Errors
    /// - [`RoomError::NotFound`]: no such room
    /// - [`RoomError::NotInRoom`]: the connection has no seat there
    pub fn set_ready(
        &mut self,
        code: &RoomCode,
        connection: ConnectionId,
        ready: bool,
    ) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;

        if !room.set_ready(connection, ready) {
            return Err(RoomError::NotInRoom(connection, code.clone()));
        }
        tracing::debug!(room = %code, %connection, ready, "ready flag set");
        Ok(room)
    }

    /// Starts the match in room `code` if both players are ready.
    ///
    /// Returns the started room, or `None` if there is no such room or it
    /// can't start. Because the check and the start happen in one call,
    /// a match is never started twice.
    pub fn start_if_ready(&mut self, code: &RoomCode) -> Option<&Room> {
        let room = self.rooms.get_mut(code)?;
        if !room.can_start() {
            return None;
        }
        room.start_match(&mut self.rng);
        tracing::info!(
            room = %code,
            seed = room.match_state().map(|m| m.seed),
            "match started"
        );
        Some(room)
    }

    /// Takes `connection`'s seat away and drops it from its room's channel.
    ///
    /// An emptied room is deleted. A room that was playing goes back to
    /// the lobby with every remaining player unready.
    pub fn remove_player(&mut self, connection: ConnectionId) -> Departure {
        self.outboxes.remove(&connection);
        let Some(code) = self.memberships.remove(&connection) else {
            return Departure::NotMember;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return Departure::NotMember;
        };
        let Some(match_aborted) = room.unseat(connection) else {
            return Departure::NotMember;
        };

        if room.is_empty() {
            self.rooms.remove(&code);
            tracing::info!(room = %code, rooms = self.rooms.len(), "room deleted");
            return Departure::RoomDeleted(code);
        }

        if match_aborted {
            tracing::info!(room = %code, %connection, "player left mid-match, room back in lobby");
        } else {
            tracing::info!(room = %code, %connection, "player left lobby");
        }
        Departure::RoomUpdated { code, match_aborted }
    }

    // -- Channels ---------------------------------------------------------

    /// Sends `event` to every connection in room `code`'s channel.
    ///
    /// Returns how many queues accepted it. Queues whose connection is
    /// already gone are skipped silently.
    pub fn broadcast(&self, code: &RoomCode, event: ServerEvent) -> usize {
        let Some(room) = self.rooms.get(code) else {
            return 0;
        };
        tracing::debug!(room = %code, event = event.name(), "broadcast");

        let frame = Envelope::broadcast(event);
        room.players()
            .iter()
            .filter_map(|p| self.outboxes.get(&p.connection_id))
            .filter(|sender| sender.send(frame.clone()).is_ok())
            .count()
    }

    /// Broadcasts `room:state` for room `code` and returns the state sent.
    pub fn broadcast_state(&self, code: &RoomCode) -> Option<PublicRoomState> {
        let state = self.rooms.get(code)?.public_state();
        self.broadcast(code, ServerEvent::RoomState(state.clone()));
        Some(state)
    }

    // -- Lookups ----------------------------------------------------------

    pub fn room(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    /// The code of the room `connection` is seated in, if any.
    pub fn room_of(&self, connection: ConnectionId) -> Option<&RoomCode> {
        self.memberships.get(&connection)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = &RoomCode> {
        self.rooms.keys()
    }

    // -- Internals --------------------------------------------------------

    /// Draws codes until one isn't taken by a live room.
    fn unique_code(&mut self) -> RoomCode {
        loop {
            let code = random_code(&mut self.rng);
            if !self.rooms.contains_key(&code) {
                return code;
            }
            tracing::debug!(room = %code, "room code collision, drawing again");
        }
    }

    fn enroll(&mut self, requester: Requester, code: &RoomCode) {
        self.memberships.insert(requester.id, code.clone());
        self.outboxes.insert(requester.id, requester.sender);
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recards_protocol::{FailureReason, RoomStatus};

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn requester(id: u64) -> (Requester, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Requester::new(conn(id), tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(frame.payload);
        }
        events
    }

    #[test]
    fn test_create_room_registers_lobby_and_membership() {
        let mut reg = RoomRegistry::with_seed(1);
        let (req, _rx) = requester(1);

        let (code, left) = reg.create_room(req, Some("Ana".into()));

        assert_eq!(left, Departure::NotMember);
        assert_eq!(reg.room_count(), 1);
        assert_eq!(reg.room_of(conn(1)), Some(&code));
        let room = reg.room(&code).unwrap();
        assert_eq!(room.status(), RoomStatus::Lobby);
        assert_eq!(room.players()[0].name, "Ana");
        assert!(!room.players()[0].ready);
    }

    #[test]
    fn test_create_room_default_name() {
        let mut reg = RoomRegistry::with_seed(1);
        let (req, _rx) = requester(1);
        let (code, _) = reg.create_room(req, None);
        assert_eq!(reg.room(&code).unwrap().players()[0].name, DEFAULT_HOST_NAME);
    }

    #[test]
    fn test_join_room_default_name() {
        let mut reg = RoomRegistry::with_seed(1);
        let (host, _h) = requester(1);
        let (guest, _g) = requester(2);
        let (code, _) = reg.create_room(host, None);

        reg.join_room(&code, guest, None).unwrap();
        assert_eq!(reg.room(&code).unwrap().players()[1].name, DEFAULT_GUEST_NAME);
    }

    #[test]
    fn test_same_seed_gives_same_codes() {
        let mut a = RoomRegistry::with_seed(42);
        let mut b = RoomRegistry::with_seed(42);
        let (ra, _x) = requester(1);
        let (rb, _y) = requester(1);
        assert_eq!(a.create_room(ra, None).0, b.create_room(rb, None).0);
    }

    #[test]
    fn test_codes_unique_among_live_rooms() {
        let mut reg = RoomRegistry::with_seed(3);
        let mut receivers = Vec::new();
        for id in 0..2_000 {
            let (req, rx) = requester(id);
            receivers.push(rx);
            reg.create_room(req, None);
        }
        assert_eq!(reg.room_count(), 2_000);
        let mut codes: Vec<_> = reg.codes().cloned().collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 2_000);
    }

    #[test]
    fn test_join_room_not_found_changes_nothing() {
        let mut reg = RoomRegistry::with_seed(1);
        let (req, _rx) = requester(1);
        let err = reg
            .join_room(&RoomCode::new("ZZZZZ"), req, None)
            .unwrap_err();
        assert_eq!(err.reason(), FailureReason::NotFound);
        assert!(reg.is_empty());
        assert_eq!(reg.room_of(conn(1)), None);
    }

    #[test]
    fn test_join_room_rejoin_same_room_is_noop() {
        let mut reg = RoomRegistry::with_seed(1);
        let (host, _rx) = requester(1);
        let (code, _) = reg.create_room(host, None);

        let (again, _rx2) = requester(1);
        assert_eq!(reg.join_room(&code, again, None), Ok(Departure::NotMember));
        assert_eq!(reg.room(&code).unwrap().player_count(), 1);
    }

    #[test]
    fn test_join_other_room_leaves_previous() {
        let mut reg = RoomRegistry::with_seed(1);
        let (a, _ra) = requester(1);
        let (b, _rb) = requester(2);
        let (c, _rc) = requester(3);
        let (first, _) = reg.create_room(a, None);
        reg.join_room(&first, b, None).unwrap();
        let (second, _) = reg.create_room(c, None);

        let (b_again, _rb2) = requester(2);
        let left = reg.join_room(&second, b_again, None).unwrap();

        assert_eq!(
            left,
            Departure::RoomUpdated { code: first.clone(), match_aborted: false }
        );
        assert_eq!(reg.room_of(conn(2)), Some(&second));
        assert_eq!(reg.room(&first).unwrap().player_count(), 1);
        assert_eq!(reg.room(&second).unwrap().player_count(), 2);
    }

    #[test]
    fn test_failed_join_keeps_current_seat() {
        let mut reg = RoomRegistry::with_seed(1);
        let (a, _ra) = requester(1);
        let (b, _rb) = requester(2);
        let (c, _rc) = requester(3);
        let (full, _) = reg.create_room(a, None);
        reg.join_room(&full, b, None).unwrap();
        let (own, _) = reg.create_room(c, None);

        let (c_again, _rc2) = requester(3);
        let err = reg.join_room(&full, c_again, None).unwrap_err();

        assert_eq!(err.reason(), FailureReason::RoomFull);
        assert_eq!(reg.room_of(conn(3)), Some(&own));
        assert!(reg.room(&own).is_some());
    }

    #[test]
    fn test_create_while_seated_deletes_solo_room() {
        let mut reg = RoomRegistry::with_seed(1);
        let (a, _ra) = requester(1);
        let (old, _) = reg.create_room(a, None);

        let (a_again, _ra2) = requester(1);
        let (new, left) = reg.create_room(a_again, None);

        assert_eq!(left, Departure::RoomDeleted(old.clone()));
        assert!(reg.room(&old).is_none());
        assert_eq!(reg.room_of(conn(1)), Some(&new));
        assert_eq!(reg.room_count(), 1);
    }

    #[test]
    fn test_set_ready_errors() {
        let mut reg = RoomRegistry::with_seed(1);
        let (a, _ra) = requester(1);
        let (code, _) = reg.create_room(a, None);

        let missing = reg.set_ready(&RoomCode::new("ZZZZZ"), conn(1), true);
        assert_eq!(missing.unwrap_err().reason(), FailureReason::NotFound);

        let stranger = reg.set_ready(&code, conn(9), true);
        assert_eq!(stranger.unwrap_err().reason(), FailureReason::NotInRoom);

        let room = reg.set_ready(&code, conn(1), true).unwrap();
        assert!(room.players()[0].ready);
    }

    #[test]
    fn test_start_if_ready_only_once() {
        let mut reg = RoomRegistry::with_seed(1);
        let (a, _ra) = requester(1);
        let (b, _rb) = requester(2);
        let (code, _) = reg.create_room(a, None);
        reg.join_room(&code, b, None).unwrap();

        reg.set_ready(&code, conn(1), true).unwrap();
        assert!(reg.start_if_ready(&code).is_none());
        reg.set_ready(&code, conn(2), true).unwrap();

        let seed = reg.start_if_ready(&code).unwrap().match_state().unwrap().seed;
        assert!(reg.start_if_ready(&code).is_none());
        assert_eq!(reg.room(&code).unwrap().match_state().unwrap().seed, seed);
    }

    #[test]
    fn test_remove_player_not_member() {
        let mut reg = RoomRegistry::with_seed(1);
        assert_eq!(reg.remove_player(conn(5)), Departure::NotMember);
    }

    #[test]
    fn test_broadcast_reaches_channel_only() {
        let mut reg = RoomRegistry::with_seed(1);
        let (a, mut ra) = requester(1);
        let (b, mut rb) = requester(2);
        let (c, mut rc) = requester(3);
        let (code, _) = reg.create_room(a, None);
        reg.join_room(&code, b, None).unwrap();
        reg.create_room(c, None);

        let sent = reg.broadcast_state(&code).unwrap();

        assert_eq!(drain(&mut ra), vec![ServerEvent::RoomState(sent.clone())]);
        assert_eq!(drain(&mut rb), vec![ServerEvent::RoomState(sent)]);
        assert!(drain(&mut rc).is_empty());
    }

    #[test]
    fn test_broadcast_skips_departed_connection() {
        let mut reg = RoomRegistry::with_seed(1);
        let (a, mut ra) = requester(1);
        let (b, mut rb) = requester(2);
        let (code, _) = reg.create_room(a, None);
        reg.join_room(&code, b, None).unwrap();

        reg.remove_player(conn(2));
        let state = reg.room(&code).unwrap().public_state();
        let delivered = reg.broadcast(&code, ServerEvent::RoomState(state));

        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut ra).len(), 1);
        assert!(drain(&mut rb).is_empty());
    }

    #[test]
    fn test_broadcast_to_missing_room() {
        let reg = RoomRegistry::with_seed(1);
        assert_eq!(reg.broadcast_state(&RoomCode::new("ZZZZZ")), None);
    }
}
