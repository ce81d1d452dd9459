use std::fmt;

use thiserror::Error;

use super::primitive::PrimitiveError;
use super::signal::SdpType;

/// Which side drives the offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// creates the offer; the room creator once a peer arrives
    Leader,
    /// answers; the joiner
    Follower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    LocalDescribing,
    DescriptionSent,
    AwaitingRemote,
    RemoteReceived,
    RemoteApplied,
    Connected,
    Failed,
}

impl NegotiationState {
    pub fn is_failed(self) -> bool {
        self == NegotiationState::Failed
    }
}

/// What the next inbound peer message is taken to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequencing {
    AwaitingDescription,
    AwaitingCandidates,
}

/// Negotiation errors. Any of them ends the session in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("peer connection: {0}")]
    Primitive(#[from] PrimitiveError),

    #[error("malformed peer message: {0}")]
    Malformed(String),

    #[error("{role:?} cannot accept a remote {got:?} description")]
    UnexpectedDescription { role: Role, got: SdpType },

    #[error("encoding peer message: {0}")]
    Encode(String),
}

/// Identifies one negotiation session within a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// What a session reports to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationEvent {
    /// encoded peer message to relay to the other side
    Outbound(String),
    Connected,
    Failed(NegotiationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub event: NegotiationEvent,
}
