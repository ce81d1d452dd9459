use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Utf8Bytes;

use crate::room::RoomId;

/// A room holds the two peers that negotiate with each other
pub const MAX_MEMBERS: usize = 2;

/// Relay server errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("room {0} is full or does not exist")]
    RoomUnavailable(RoomId),

    #[error("internal error: {0}")]
    Internal(String),
}

static NEXT_MEMBER: AtomicU64 = AtomicU64::new(1);

/// One WebSocket connection on the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(u64);

impl MemberId {
    pub fn next() -> Self {
        Self(NEXT_MEMBER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    /// Get the inner Utf8Bytes for tungstenite Message::Text
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}

/// Channel for outbound messages to one member. Cloning an
/// [`OutboundMessage`] is O(1), so broadcasting shares one buffer.
pub type MemberTx = mpsc::UnboundedSender<OutboundMessage>;

#[derive(Debug, Default)]
pub(crate) struct RelayRoom {
    pub members: HashMap<MemberId, MemberTx>,
}

impl RelayRoom {
    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_MEMBERS
    }

    /// Send to every member except `from`
    pub fn broadcast(&self, from: MemberId, msg: &OutboundMessage) {
        for (id, tx) in &self.members {
            if *id != from {
                let _ = tx.send(msg.clone());
            }
        }
    }
}
