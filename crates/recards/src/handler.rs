//! Per-connection handler: outbound queue, event dispatch, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Spawn a writer task draining the connection's outbound queue
//!   2. Loop: receive envelopes → dispatch client events → queue acks
//!   3. On close, error or idle timeout, leave the room (drop guard)

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use recards_protocol::{
    AckHeader, AckResult, ClientEvent, Codec, CreateRoom, Envelope, FailureReason, Inbound, JoinRoom,
    JsonCodec, Outbound, ServerEvent, SetReady,
};
use recards_room::{Departure, Requester, RoomRegistry};
use recards_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::RecardsError;
use crate::server::ServerState;

/// Drop guard that takes the connection out of its room when the handler
/// exits, however it exits.
///
/// Since `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async lock.
struct DepartureGuard {
    connection: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for DepartureGuard {
    fn drop(&mut self) {
        let connection = self.connection;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut registry = state.registry.lock().await;
            let left = registry.remove_player(connection);
            announce_departure(&registry, &left);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), RecardsError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outbound(Arc::clone(&conn), rx, state.codec));

    let _guard = DepartureGuard {
        connection: conn_id,
        state: Arc::clone(&state),
    };
    let requester = Requester::new(conn_id, tx);

    let result = read_loop(&conn, &state, &requester).await;

    writer.abort();
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    // _guard drops here → the room is told this player left.
    result
}

/// Receives frames until the peer goes away or stops answering pings.
async fn read_loop(
    conn: &WebSocketConnection,
    state: &ServerState,
    requester: &Requester,
) -> Result<(), RecardsError> {
    let conn_id = requester.id;

    loop {
        let received = match state.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit / 2, conn.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    if conn.idle_for() >= limit {
                        tracing::info!(%conn_id, "connection timed out");
                        return Ok(());
                    }
                    conn.ping().await?;
                    continue;
                }
            },
            None => conn.recv().await,
        };

        let Some(data) = received? else {
            tracing::debug!(%conn_id, "connection closed cleanly");
            return Ok(());
        };

        let inbound: Inbound = match state.codec.decode(&data) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                send(requester, Envelope::broadcast(ServerEvent::Error {
                    code: 400,
                    message: e.to_string(),
                }));
                if let Ok(AckHeader { ack: Some(id) }) = state.codec.decode(&data) {
                    send(requester, Envelope::ack(id, AckResult::rejected()));
                }
                continue;
            }
        };

        tracing::debug!(%conn_id, event = inbound.payload.name(), "event received");
        let result = dispatch(state, requester, inbound.payload).await;
        if let Some(id) = inbound.ack {
            send(requester, Envelope::ack(id, result));
        }
    }
}

/// Runs one client event to completion and returns its acknowledgement.
///
/// The registry lock is held for the whole event, broadcasts included.
/// Broadcasts reach the requester's queue before the ack does.
async fn dispatch(state: &ServerState, requester: &Requester, event: ClientEvent) -> AckResult {
    match event {
        ClientEvent::CreateRoom(CreateRoom { name }) => {
            let mut registry = state.registry.lock().await;
            let (code, left) = registry.create_room(requester.clone(), name);
            announce_departure(&registry, &left);
            match registry.broadcast_state(&code) {
                Some(room) => AckResult::created(code, room),
                None => AckResult::failed(FailureReason::NotFound),
            }
        }

        ClientEvent::JoinRoom(JoinRoom { code, name }) => {
            let mut registry = state.registry.lock().await;
            match registry.join_room(&code, requester.clone(), name) {
                Ok(left) => {
                    announce_departure(&registry, &left);
                    match registry.broadcast_state(&code) {
                        Some(room) => AckResult::joined(room),
                        None => AckResult::failed(FailureReason::NotFound),
                    }
                }
                Err(e) => {
                    tracing::debug!(conn_id = %requester.id, error = %e, "join refused");
                    AckResult::failed(e.reason())
                }
            }
        }

        ClientEvent::SetReady(SetReady { code, ready }) => {
            let mut registry = state.registry.lock().await;
            if let Err(e) = registry.set_ready(&code, requester.id, ready) {
                tracing::debug!(conn_id = %requester.id, error = %e, "ready refused");
                return AckResult::failed(e.reason());
            }
            registry.broadcast_state(&code);
            start_match(&mut registry, &code);
            AckResult::ok()
        }

        ClientEvent::Ping => AckResult::pong(unix_millis()),
    }
}

/// Starts the match if both players are ready and announces it.
fn start_match(registry: &mut RoomRegistry, code: &recards_protocol::RoomCode) {
    let Some(room) = registry.start_if_ready(code) else {
        return;
    };
    let started = room.public_state();
    registry.broadcast(code, ServerEvent::MatchStart(started.clone()));
    registry.broadcast(code, ServerEvent::MatchSync(started));
}

/// Tells whoever is left in a room that a player has gone.
fn announce_departure(registry: &RoomRegistry, departure: &Departure) {
    if let Departure::RoomUpdated { code, .. } = departure {
        registry.broadcast_state(code);
    }
}

fn send(requester: &Requester, frame: Outbound) {
    if requester.sender.send(frame).is_err() {
        tracing::debug!(conn_id = %requester.id, "outbound queue closed");
    }
}

/// Drains the outbound queue into the socket until either side goes away.
async fn write_outbound(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    codec: JsonCodec,
) {
    while let Some(frame) = rx.recv().await {
        let bytes = match codec.encode(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
            break;
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
