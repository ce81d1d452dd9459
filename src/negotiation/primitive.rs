//! Seam to the external peer-connection implementation

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::signal::{IceCandidate, SessionDescription};
use super::state::Role;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PrimitiveError(pub String);

impl From<&str> for PrimitiveError {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Asynchronous notifications from the peer connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveEvent {
    LocalCandidate(IceCandidate),
    ChannelOpen,
    Error(String),
}

/// A peer connection the negotiation session drives. Owned by exactly one session.
#[async_trait]
pub trait PeerConnection: Send {
    /// Local-media prerequisite, awaited before a Leader creates its offer
    async fn prepare(&mut self) -> Result<(), PrimitiveError> {
        Ok(())
    }

    async fn create_offer(&mut self) -> Result<SessionDescription, PrimitiveError>;

    async fn create_answer(&mut self) -> Result<SessionDescription, PrimitiveError>;

    async fn set_local_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), PrimitiveError>;

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), PrimitiveError>;

    async fn add_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), PrimitiveError>;

    /// Release the underlying connection
    async fn close(&mut self);
}

/// Builds a peer connection for a new session.
///
/// A Leader's connection is expected to open its data channel itself;
/// `events` receives candidates, channel-open and errors.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync + 'static {
    async fn create(
        &self,
        role: Role,
        events: mpsc::UnboundedSender<PrimitiveEvent>,
    ) -> Result<Box<dyn PeerConnection>, PrimitiveError>;
}
