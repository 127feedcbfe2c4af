//! Integration tests for the room registry: full lobby lifecycles driven
//! through the public API, with broadcasts observed on real channels.

use recards_protocol::{FailureReason, Outbound, RoomCode, RoomStatus, ServerEvent};
use recards_room::{
    CODE_ALPHABET, CODE_LEN, Departure, MAX_PLAYERS, Requester, RoomError, RoomRegistry,
};
use recards_transport::ConnectionId;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

struct Client {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Client {
    fn new(id: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { id: ConnectionId::new(id), tx, rx }
    }

    fn requester(&self) -> Requester {
        Requester::new(self.id, self.tx.clone())
    }

    /// Every broadcast received so far.
    fn events(&mut self) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            assert_eq!(frame.ack, None, "broadcasts never carry an ack id");
            out.push(frame.payload);
        }
        out
    }
}

/// Creates a room hosted by `host` and seats `guest` in it.
fn two_player_room(reg: &mut RoomRegistry, host: &Client, guest: &Client) -> RoomCode {
    let (code, _) = reg.create_room(host.requester(), Some("Ana".into()));
    reg.join_room(&code, guest.requester(), Some("Bo".into()))
        .expect("second seat should be free");
    code
}

/// Readies both players and runs the start check after each, the way the
/// server does.
fn ready_both(reg: &mut RoomRegistry, code: &RoomCode, a: &Client, b: &Client) {
    for c in [a, b] {
        reg.set_ready(code, c.id, true).unwrap();
        reg.broadcast_state(code);
        if reg.start_if_ready(code).is_some() {
            let state = reg.room(code).unwrap().public_state();
            reg.broadcast(code, ServerEvent::MatchStart(state.clone()));
            reg.broadcast(code, ServerEvent::MatchSync(state));
        }
    }
}

// =========================================================================
// Creation and codes
// =========================================================================

#[test]
fn test_created_code_shape() {
    let mut reg = RoomRegistry::with_seed(11);
    let host = Client::new(1);
    let (code, _) = reg.create_room(host.requester(), None);

    assert_eq!(code.as_str().len(), CODE_LEN);
    assert!(code.as_str().bytes().all(|b| CODE_ALPHABET.contains(&b)));
}

#[test]
fn test_many_rooms_have_distinct_codes() {
    let mut reg = RoomRegistry::with_seed(12);
    let clients: Vec<_> = (0..500).map(Client::new).collect();
    let mut codes: Vec<_> = clients
        .iter()
        .map(|c| reg.create_room(c.requester(), None).0)
        .collect();

    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 500);
    assert_eq!(reg.room_count(), 500);
}

#[test]
fn test_join_is_case_insensitive() {
    let mut reg = RoomRegistry::with_seed(13);
    let host = Client::new(1);
    let guest = Client::new(2);
    let (code, _) = reg.create_room(host.requester(), None);

    let typed = RoomCode::new(format!("  {} ", code.as_str().to_ascii_lowercase()));
    reg.join_room(&typed, guest.requester(), None).unwrap();
    assert_eq!(reg.room(&code).unwrap().player_count(), 2);
}

// =========================================================================
// Join failures
// =========================================================================

#[test]
fn test_join_unknown_code_leaves_registry_untouched() {
    let mut reg = RoomRegistry::with_seed(14);
    let host = Client::new(1);
    let stranger = Client::new(2);
    let (code, _) = reg.create_room(host.requester(), None);

    let err = reg
        .join_room(&RoomCode::new("ZZZZZ"), stranger.requester(), None)
        .unwrap_err();

    assert_eq!(err, RoomError::NotFound(RoomCode::new("ZZZZZ")));
    assert_eq!(reg.room_count(), 1);
    assert_eq!(reg.room(&code).unwrap().player_count(), 1);
    assert_eq!(reg.room_of(stranger.id), None);
}

#[test]
fn test_third_player_gets_room_full() {
    let mut reg = RoomRegistry::with_seed(15);
    let (a, b, c) = (Client::new(1), Client::new(2), Client::new(3));
    let code = two_player_room(&mut reg, &a, &b);

    let err = reg.join_room(&code, c.requester(), None).unwrap_err();
    assert_eq!(err.reason(), FailureReason::RoomFull);
    assert_eq!(reg.room(&code).unwrap().player_count(), MAX_PLAYERS);
}

#[test]
fn test_join_running_match_reports_already_started() {
    let mut reg = RoomRegistry::with_seed(16);
    let (a, b, c) = (Client::new(1), Client::new(2), Client::new(3));
    let code = two_player_room(&mut reg, &a, &b);
    ready_both(&mut reg, &code, &a, &b);

    let err = reg.join_room(&code, c.requester(), None).unwrap_err();
    assert_eq!(err.reason(), FailureReason::AlreadyStarted);
}

#[test]
fn test_ready_from_outsider_is_not_in_room() {
    let mut reg = RoomRegistry::with_seed(17);
    let (a, b, c) = (Client::new(1), Client::new(2), Client::new(3));
    let code = two_player_room(&mut reg, &a, &b);

    let err = reg.set_ready(&code, c.id, true).unwrap_err();
    assert_eq!(err.reason(), FailureReason::NotInRoom);
    assert!(reg.room(&code).unwrap().players().iter().all(|p| !p.ready));
}

// =========================================================================
// Full lifecycle
// =========================================================================

#[test]
fn test_lobby_to_match_broadcast_sequence() {
    let mut reg = RoomRegistry::with_seed(18);
    let (mut a, mut b) = (Client::new(1), Client::new(2));
    let code = two_player_room(&mut reg, &a, &b);
    a.events();
    b.events();

    reg.set_ready(&code, a.id, true).unwrap();
    reg.broadcast_state(&code);
    assert!(reg.start_if_ready(&code).is_none());

    let after_first = b.events();
    assert_eq!(after_first.len(), 1);
    let ServerEvent::RoomState(state) = &after_first[0] else {
        panic!("expected room:state, got {after_first:?}");
    };
    assert_eq!(state.status, RoomStatus::Lobby);
    assert!(state.players[0].ready);
    assert!(!state.players[1].ready);
    a.events();

    reg.set_ready(&code, b.id, true).unwrap();
    reg.broadcast_state(&code);
    let started = reg.start_if_ready(&code).expect("both ready").public_state();
    reg.broadcast(&code, ServerEvent::MatchStart(started.clone()));
    reg.broadcast(&code, ServerEvent::MatchSync(started.clone()));

    for client in [&mut a, &mut b] {
        let names: Vec<_> = client.events().iter().map(ServerEvent::name).collect();
        assert_eq!(names, ["room:state", "match:start", "match:sync"]);
    }

    assert_eq!(started.status, RoomStatus::Playing);
    let m = started.match_state.expect("match present once playing");
    assert_eq!((m.schema_version, m.turn, m.active), (1, 1, 0));
    assert!(m.seed < 1_000_000_000);
}

#[test]
fn test_unready_then_ready_again_does_not_start_early() {
    let mut reg = RoomRegistry::with_seed(19);
    let (a, b) = (Client::new(1), Client::new(2));
    let code = two_player_room(&mut reg, &a, &b);

    reg.set_ready(&code, a.id, true).unwrap();
    reg.set_ready(&code, a.id, false).unwrap();
    reg.set_ready(&code, b.id, true).unwrap();
    assert!(reg.start_if_ready(&code).is_none());

    reg.set_ready(&code, a.id, true).unwrap();
    assert!(reg.start_if_ready(&code).is_some());
}

#[test]
fn test_leaving_mid_match_reverts_survivor_to_lobby() {
    let mut reg = RoomRegistry::with_seed(20);
    let (a, mut b) = (Client::new(1), Client::new(2));
    let code = two_player_room(&mut reg, &a, &b);
    ready_both(&mut reg, &code, &a, &b);
    b.events();

    let left = reg.remove_player(a.id);
    assert_eq!(
        left,
        Departure::RoomUpdated { code: code.clone(), match_aborted: true }
    );
    reg.broadcast_state(&code);

    let events = b.events();
    let [ServerEvent::RoomState(state)] = events.as_slice() else {
        panic!("expected a single room:state, got {events:?}");
    };
    assert_eq!(state.status, RoomStatus::Lobby);
    assert!(state.match_state.is_none());
    assert_eq!(state.players.len(), 1);
    assert_eq!(state.players[0].name, "Bo");
    assert!(!state.players[0].ready);

    // The freed seat can be taken again.
    let c = Client::new(3);
    reg.join_room(&code, c.requester(), None).unwrap();
}

#[test]
fn test_last_player_leaving_deletes_room() {
    let mut reg = RoomRegistry::with_seed(21);
    let (a, b) = (Client::new(1), Client::new(2));
    let code = two_player_room(&mut reg, &a, &b);

    reg.remove_player(a.id);
    assert_eq!(reg.remove_player(b.id), Departure::RoomDeleted(code.clone()));
    assert!(reg.room(&code).is_none());
    assert!(reg.is_empty());

    let late = Client::new(3);
    let err = reg.join_room(&code, late.requester(), None).unwrap_err();
    assert_eq!(err.reason(), FailureReason::NotFound);
}

#[test]
fn test_departed_player_gets_no_further_broadcasts() {
    let mut reg = RoomRegistry::with_seed(22);
    let (a, mut b) = (Client::new(1), Client::new(2));
    let code = two_player_room(&mut reg, &a, &b);
    b.events();

    reg.remove_player(b.id);
    reg.broadcast_state(&code);
    assert!(b.events().is_empty());
}

#[test]
fn test_connection_sits_in_one_room_at_most() {
    let mut reg = RoomRegistry::with_seed(23);
    let (a, b) = (Client::new(1), Client::new(2));
    let (first, _) = reg.create_room(a.requester(), None);
    let (second, _) = reg.create_room(b.requester(), None);

    reg.join_room(&first, b.requester(), None).unwrap();

    assert_eq!(reg.room_of(b.id), Some(&first));
    assert!(reg.room(&second).is_none(), "b's solo room should be gone");
    let seated = reg
        .codes()
        .filter(|c| reg.room(c).unwrap().contains(b.id))
        .count();
    assert_eq!(seated, 1);
}
