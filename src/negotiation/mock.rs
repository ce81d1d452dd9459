//! Recording peer connection for tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::primitive::{PeerConnection, PeerConnectionFactory, PrimitiveError, PrimitiveEvent};
use super::signal::{IceCandidate, SdpType, SessionDescription};
use super::state::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Prepare,
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpType),
    SetRemote(SdpType),
    AddCandidate(String),
    Close,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

pub(crate) struct MockPeer {
    log: CallLog,
    reject_remote: bool,
    reject_candidates: bool,
    stall_prepare: bool,
    remote_delay: Option<Duration>,
    open_on_remote: Option<mpsc::UnboundedSender<PrimitiveEvent>>,
}

impl MockPeer {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            reject_remote: false,
            reject_candidates: false,
            stall_prepare: false,
            remote_delay: None,
            open_on_remote: None,
        }
    }

    pub fn rejecting_remote(mut self) -> Self {
        self.reject_remote = true;
        self
    }

    pub fn rejecting_candidates(mut self) -> Self {
        self.reject_candidates = true;
        self
    }

    /// `prepare` never completes
    pub fn stalling_prepare(mut self) -> Self {
        self.stall_prepare = true;
        self
    }

    pub fn slow_remote(mut self, delay: Duration) -> Self {
        self.remote_delay = Some(delay);
        self
    }

    /// Report `ChannelOpen` as soon as a remote description is applied
    pub fn opening_on_remote(mut self, events: mpsc::UnboundedSender<PrimitiveEvent>) -> Self {
        self.open_on_remote = Some(events);
        self
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    async fn prepare(&mut self) -> Result<(), PrimitiveError> {
        self.log.push(Call::Prepare);
        if self.stall_prepare {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn create_offer(&mut self) -> Result<SessionDescription, PrimitiveError> {
        self.log.push(Call::CreateOffer);
        Ok(SessionDescription::new(SdpType::Offer, "mock-offer"))
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, PrimitiveError> {
        self.log.push(Call::CreateAnswer);
        Ok(SessionDescription::new(SdpType::Answer, "mock-answer"))
    }

    async fn set_local_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), PrimitiveError> {
        self.log.push(Call::SetLocal(description.kind));
        Ok(())
    }

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), PrimitiveError> {
        self.log.push(Call::SetRemote(description.kind));
        if let Some(delay) = self.remote_delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject_remote {
            return Err(PrimitiveError::from("incompatible description"));
        }
        if let Some(events) = &self.open_on_remote {
            let _ = events.send(PrimitiveEvent::ChannelOpen);
        }
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), PrimitiveError> {
        self.log.push(Call::AddCandidate(candidate.candidate));
        if self.reject_candidates {
            return Err(PrimitiveError::from("bad candidate"));
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.log.push(Call::Close);
    }
}

/// Hands out [`MockPeer`]s that open as soon as their remote description is set
#[derive(Debug, Clone, Default)]
pub(crate) struct MockFactory {
    created: Arc<Mutex<Vec<(Role, CallLog)>>>,
}

impl MockFactory {
    pub fn created(&self) -> Vec<(Role, CallLog)> {
        self.created.lock().unwrap().clone()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.created().into_iter().map(|(role, _)| role).collect()
    }
}

#[async_trait]
impl PeerConnectionFactory for MockFactory {
    async fn create(
        &self,
        role: Role,
        events: mpsc::UnboundedSender<PrimitiveEvent>,
    ) -> Result<Box<dyn PeerConnection>, PrimitiveError> {
        let log = CallLog::default();
        self.created.lock().unwrap().push((role, log.clone()));
        Ok(Box::new(MockPeer::new(log).opening_on_remote(events)))
    }
}
