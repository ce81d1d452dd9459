use std::error::Error as StdError;

use async_trait::async_trait;
use thiserror::Error;

use crate::negotiation::{NegotiationError, NegotiationState, Role, SessionHandle, SessionId};
use crate::room::{Room, RoomError, RoomId};
use crate::transport::{TransportError, TransportFailure};

/// Coordinator errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("coordinator stopped")]
    Stopped,
}

/// What the host application sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    RoomCreated(RoomId),
    RoomJoined(RoomId),
    /// the peer data channel is open
    PeerConnected(RoomId),
    NegotiationFailed {
        room: RoomId,
        error: NegotiationError,
    },
    /// the relay cannot be reached any more; the room is gone
    ServerUnreachable(TransportFailure),
    /// call `refresh(token)` to reconnect
    RefreshNeeded,
    RoomClosed(RoomId),
}

/// Supplies a fresh relay credential when the old one expires
#[async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    async fn fetch_token(
        &self,
        room: Option<&RoomId>,
    ) -> Result<String, Box<dyn StdError + Send + Sync>>;
}

/// Snapshot of the active negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub role: Role,
    pub state: NegotiationState,
}

/// Room state owned by the coordinator
#[derive(Default)]
pub(crate) struct RoomContext {
    pub room: Option<Room>,
    pub session: Option<SessionHandle>,
}

impl RoomContext {
    pub fn room_id(&self) -> Option<RoomId> {
        self.room.as_ref().map(|room| room.id.clone())
    }

    /// A session that has not failed blocks a new one
    pub fn has_live_session(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.state().is_failed())
    }

    pub fn summary(&self) -> Option<SessionSummary> {
        self.session.as_ref().map(|session| SessionSummary {
            id: session.id(),
            role: session.role(),
            state: session.state(),
        })
    }
}
