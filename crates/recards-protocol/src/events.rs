//! Named events and the envelope that carries them.
//!
//! Every frame, in either direction, is an [`Envelope`]:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ ack: 7                                       │  ← optional reply id
//! │ ┌──────────────────────────────────────────┐ │
//! │ │ payload: { event: "room:join",           │ │  ← event name
//! │ │            data: { code, name } }        │ │  ← event data
//! │ └──────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A client that wants an answer puts an `ack` id on its request; the
//! server answers with an `ack` event carrying the same id. Broadcasts
//! (`room:state`, `match:start`, `match:sync`) carry no id.

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::{FailureReason, PublicRoomState, RoomCode};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level frame wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Acknowledgement id: requested by the client on inbound frames,
    /// echoed by the server on `ack` replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,

    /// The event itself.
    pub payload: P,
}

/// A frame sent by a client.
pub type Inbound = Envelope<ClientEvent>;

/// A frame sent by the server.
pub type Outbound = Envelope<ServerEvent>;

/// Just the `ack` id of an inbound frame.
///
/// Read off a frame whose payload failed to decode, so the client still
/// gets an answer to the request it is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct AckHeader {
    #[serde(default)]
    pub ack: Option<u64>,
}

impl Envelope<ServerEvent> {
    /// A frame that replies to nothing: room broadcasts and error notices.
    pub fn broadcast(event: ServerEvent) -> Self {
        Self { ack: None, payload: event }
    }

    /// The reply to the inbound frame that carried `id`.
    pub fn ack(id: u64, result: AckResult) -> Self {
        Self {
            ack: Some(id),
            payload: ServerEvent::Ack(result),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

/// Events a client can send.
///
/// Each event has a `room:*` name and a dashed alias (`create-room`,
/// `join-room`, `set-ready`); both decode to the same variant. A missing
/// or `null` `data` decodes as the payload's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Open a new room and become its first player.
    #[serde(rename = "room:create", alias = "create-room")]
    CreateRoom(CreateRoom),

    /// Enter an existing room by code.
    #[serde(rename = "room:join", alias = "join-room")]
    JoinRoom(JoinRoom),

    /// Toggle the sender's ready flag.
    #[serde(rename = "room:ready", alias = "set-ready")]
    SetReady(SetReady),

    /// Latency check; answered with the server clock.
    #[serde(rename = "ping")]
    Ping,
}

impl ClientEvent {
    /// The canonical wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom(_) => "room:create",
            Self::JoinRoom(_) => "room:join",
            Self::SetReady(_) => "room:ready",
            Self::Ping => "ping",
        }
    }
}

/// Wire form of [`ClientEvent`] in which every payload may be absent.
#[derive(Deserialize)]
#[serde(tag = "event", content = "data")]
enum RawClientEvent {
    #[serde(rename = "room:create", alias = "create-room")]
    CreateRoom(Option<CreateRoom>),
    #[serde(rename = "room:join", alias = "join-room")]
    JoinRoom(Option<JoinRoom>),
    #[serde(rename = "room:ready", alias = "set-ready")]
    SetReady(Option<SetReady>),
    #[serde(rename = "ping")]
    Ping,
}

impl<'de> Deserialize<'de> for ClientEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawClientEvent::deserialize(deserializer)? {
            RawClientEvent::CreateRoom(data) => Self::CreateRoom(data.unwrap_or_default()),
            RawClientEvent::JoinRoom(data) => Self::JoinRoom(data.unwrap_or_default()),
            RawClientEvent::SetReady(data) => Self::SetReady(data.unwrap_or_default()),
            RawClientEvent::Ping => Self::Ping,
        })
    }
}

/// Data of `room:create`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateRoom {
    /// Display name; the server picks `Player 1` when absent.
    #[serde(default)]
    pub name: Option<String>,
}

/// Data of `room:join`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinRoom {
    /// A missing code decodes as the empty code, which matches no room.
    #[serde(default)]
    pub code: RoomCode,
    /// Display name; the server picks `Player 2` when absent.
    #[serde(default)]
    pub name: Option<String>,
}

/// Data of `room:ready`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SetReady {
    #[serde(default)]
    pub code: RoomCode,
    /// Any JSON value, coerced to a boolean by truthiness.
    #[serde(default, deserialize_with = "truthy")]
    pub ready: bool,
}

/// Coerces any JSON value to a boolean the way browser clients expect:
/// `false`, `null`, `0`, `NaN` and `""` are false, everything else is
/// true (including empty arrays and objects).
fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    struct TruthyVisitor;

    impl<'de> Visitor<'de> for TruthyVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("any JSON value")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<bool, E> {
            Ok(v != 0.0 && !v.is_nan())
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            Ok(!v.is_empty())
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_none<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<bool, D2::Error> {
            d.deserialize_any(TruthyVisitor)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<bool, A::Error> {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            Ok(true)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<bool, A::Error> {
            while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
            Ok(true)
        }
    }

    deserializer.deserialize_any(TruthyVisitor)
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Reply to a client request that asked for acknowledgement.
    #[serde(rename = "ack")]
    Ack(AckResult),

    /// The room's public state changed.
    #[serde(rename = "room:state")]
    RoomState(PublicRoomState),

    /// Both players were ready and the match began.
    #[serde(rename = "match:start")]
    MatchStart(PublicRoomState),

    /// Authoritative match snapshot.
    #[serde(rename = "match:sync")]
    MatchSync(PublicRoomState),

    /// An inbound frame could not be understood. `code` follows HTTP
    /// conventions (400 = bad request).
    #[serde(rename = "error")]
    Error { code: u16, message: String },
}

impl ServerEvent {
    /// The wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ack(_) => "ack",
            Self::RoomState(_) => "room:state",
            Self::MatchStart(_) => "match:start",
            Self::MatchSync(_) => "match:sync",
            Self::Error { .. } => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// AckResult
// ---------------------------------------------------------------------------

/// The result object handed back through an acknowledgement.
///
/// Only the fields that apply are serialized, giving exactly these shapes:
///
/// | request     | success                  | failure                 |
/// |-------------|--------------------------|-------------------------|
/// | room:create | `{ok:true, code, state}` | n/a                     |
/// | room:join   | `{ok:true, state}`       | `{ok:false, reason}`    |
/// | room:ready  | `{ok:true}`              | `{ok:false, reason}`    |
/// | ping        | `{t}`                    | n/a                     |
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AckResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<RoomCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PublicRoomState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    /// Server wall clock in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<u64>,
}

impl AckResult {
    /// `{ok:true}`
    pub fn ok() -> Self {
        Self { ok: Some(true), ..Self::default() }
    }

    /// `{ok:true, code, state}`
    pub fn created(code: RoomCode, state: PublicRoomState) -> Self {
        Self {
            ok: Some(true),
            code: Some(code),
            state: Some(state),
            ..Self::default()
        }
    }

    /// `{ok:true, state}`
    pub fn joined(state: PublicRoomState) -> Self {
        Self {
            ok: Some(true),
            state: Some(state),
            ..Self::default()
        }
    }

    /// `{ok:false, reason}`
    pub fn failed(reason: FailureReason) -> Self {
        Self {
            ok: Some(false),
            reason: Some(reason),
            ..Self::default()
        }
    }

    /// `{t}`
    pub fn pong(t: u64) -> Self {
        Self { t: Some(t), ..Self::default() }
    }

    /// `{ok:false}`, for a request whose payload could not be decoded.
    pub fn rejected() -> Self {
        Self { ok: Some(false), ..Self::default() }
    }
}

// =========================================================================
// Tests
// =========================================================================
