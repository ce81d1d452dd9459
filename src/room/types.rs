use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::{CloseCode, TransportError, TransportFailure};

/// Relay-assigned ids are five-digit numbers
const ROOM_ID_RANGE: std::ops::RangeInclusive<u32> = 10_000..=99_999;

/// Room protocol errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("invalid room: {0}")]
    InvalidRoom(RoomId),

    #[error("a create or join request is already pending")]
    RequestPending,

    #[error("already a member of room {0}")]
    AlreadyMember(RoomId),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("room protocol stopped")]
    Stopped,
}

/// Room identifier as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        let value = rand::rng().random_range(ROOM_ID_RANGE);
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether this side created the room or joined it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomRole {
    Creator,
    Joiner,
}

/// Current membership
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub role: RoomRole,
}

/// Room lifecycle events, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    Created(RoomId),
    Joined(RoomId),
    /// membership confirmed again after a reconnect
    Rejoined(RoomId),
    /// the relay no longer knows the room we were in
    RoomLost(RoomId),
    PeerArrived(RoomId),
    PeerMessage {
        room: RoomId,
        payload: String,
    },
    Disconnected(CloseCode),
    Reconnected,
    RefreshNeeded,
    TransportFailed(TransportFailure),
}
