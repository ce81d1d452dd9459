use std::mem;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::primitive::{PeerConnection, PrimitiveError, PrimitiveEvent};
use super::signal::{IceCandidate, PeerSignal, SdpType, SessionDescription};
use super::state::{
    NegotiationError, NegotiationEvent, NegotiationState, Role, SessionEvent, SessionId,
    Sequencing,
};

/// Offer/answer/candidate state machine for one room membership.
///
/// Owns its peer connection. Inbound messages are taken in order: the first
/// is the remote description, the rest are candidates. Candidates that show
/// up before the description are held and replayed right after it is applied.
pub struct Negotiation {
    session: SessionId,
    role: Role,
    state: watch::Sender<NegotiationState>,
    sequencing: Sequencing,
    pending_candidates: Vec<IceCandidate>,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    primitive: Box<dyn PeerConnection>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Negotiation {
    pub fn new(
        session: SessionId,
        role: Role,
        primitive: Box<dyn PeerConnection>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (state, _) = watch::channel(NegotiationState::Idle);
        Self {
            session,
            role,
            state,
            sequencing: Sequencing::AwaitingDescription,
            pending_candidates: Vec::new(),
            local: None,
            remote: None,
            primitive,
            events,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<NegotiationState> {
        self.state.subscribe()
    }

    pub fn sequencing(&self) -> Sequencing {
        self.sequencing
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local.as_ref()
    }

    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote.as_ref()
    }

    /// Leader: prepare, create and send the offer. Follower: wait for it.
    pub async fn start(&mut self) -> Result<(), NegotiationError> {
        info!("{} starting as {:?}", self.session, self.role);
        match self.role {
            Role::Leader => {
                self.primitive.prepare().await?;
                self.set_state(NegotiationState::LocalDescribing);
                let offer = self.primitive.create_offer().await?;
                self.send_local(offer).await
            }
            Role::Follower => {
                self.set_state(NegotiationState::AwaitingRemote);
                Ok(())
            }
        }
    }

    pub async fn on_peer_message(&mut self, text: &str) -> Result<(), NegotiationError> {
        match self.sequencing {
            Sequencing::AwaitingDescription => match PeerSignal::decode(text)? {
                PeerSignal::Sdp(description) => self.apply_remote(description).await,
                PeerSignal::Candidate(candidate) => {
                    debug!("{} buffering early candidate", self.session);
                    self.pending_candidates.push(candidate);
                    Ok(())
                }
            },
            Sequencing::AwaitingCandidates => {
                match PeerSignal::decode(text) {
                    Ok(PeerSignal::Candidate(candidate)) => self.add_candidate(candidate).await,
                    Ok(PeerSignal::Sdp(description)) => {
                        warn!(
                            "{} ignoring extra {:?} description",
                            self.session, description.kind
                        );
                    }
                    Err(e) => warn!("{} dropping peer message: {}", self.session, e),
                }
                Ok(())
            }
        }
    }

    /// Apply the remote description, replay buffered candidates and, as
    /// Follower, answer.
    pub async fn apply_remote(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if !self.accepts(description.kind) {
            return Err(NegotiationError::UnexpectedDescription {
                role: self.role,
                got: description.kind,
            });
        }

        self.sequencing = Sequencing::AwaitingCandidates;
        self.set_state(NegotiationState::RemoteReceived);
        self.primitive
            .set_remote_description(description.clone())
            .await?;
        self.remote = Some(description);
        self.set_state(NegotiationState::RemoteApplied);

        let buffered = mem::take(&mut self.pending_candidates);
        if !buffered.is_empty() {
            debug!("{} replaying {} candidate(s)", self.session, buffered.len());
        }
        for candidate in buffered {
            self.add_candidate(candidate).await;
        }

        if self.role == Role::Follower {
            self.set_state(NegotiationState::LocalDescribing);
            let answer = self.primitive.create_answer().await?;
            self.send_local(answer).await?;
        }
        Ok(())
    }

    pub async fn on_primitive_event(&mut self, event: PrimitiveEvent) -> Result<(), NegotiationError> {
        match event {
            PrimitiveEvent::LocalCandidate(candidate) => {
                let text = PeerSignal::Candidate(candidate).encode()?;
                self.emit(NegotiationEvent::Outbound(text));
            }
            PrimitiveEvent::ChannelOpen => {
                if self.state() != NegotiationState::Connected {
                    info!("{} connected", self.session);
                    self.set_state(NegotiationState::Connected);
                    self.emit(NegotiationEvent::Connected);
                }
            }
            PrimitiveEvent::Error(message) => {
                return Err(NegotiationError::Primitive(PrimitiveError(message)));
            }
        }
        Ok(())
    }

    /// Terminal: report the error and release the peer connection
    pub async fn fail(&mut self, err: NegotiationError) {
        error!("{} failed: {}", self.session, err);
        self.set_state(NegotiationState::Failed);
        self.emit(NegotiationEvent::Failed(err));
        self.close().await;
    }

    pub async fn close(&mut self) {
        self.pending_candidates.clear();
        self.primitive.close().await;
        debug!("{} closed", self.session);
    }

    fn accepts(&self, kind: SdpType) -> bool {
        match self.role {
            Role::Leader => matches!(kind, SdpType::Answer | SdpType::Pranswer),
            Role::Follower => kind == SdpType::Offer,
        }
    }

    async fn send_local(&mut self, description: SessionDescription) -> Result<(), NegotiationError> {
        self.primitive
            .set_local_description(description.clone())
            .await?;
        let text = PeerSignal::Sdp(description.clone()).encode()?;
        self.local = Some(description);
        self.emit(NegotiationEvent::Outbound(text));
        self.set_state(NegotiationState::DescriptionSent);
        Ok(())
    }

    async fn add_candidate(&mut self, candidate: IceCandidate) {
        if let Err(e) = self.primitive.add_remote_candidate(candidate).await {
            warn!("{} remote candidate rejected: {}", self.session, e);
        }
    }

    fn set_state(&self, state: NegotiationState) {
        let previous = self.state.send_replace(state);
        debug!("{} {:?} -> {:?}", self.session, previous, state);
    }

    fn emit(&self, event: NegotiationEvent) {
        let _ = self.events.send(SessionEvent {
            session: self.session,
            event,
        });
    }
}

async fn session_actor(
    mut negotiation: Negotiation,
    mut inbox: mpsc::UnboundedReceiver<String>,
    mut primitive_events: mpsc::UnboundedReceiver<PrimitiveEvent>,
    shutdown: oneshot::Receiver<()>,
) {
    // teardown may land while the primitive is mid-call
    let result = tokio::select! {
        biased;

        _ = shutdown => {
            debug!("{} handle dropped", negotiation.session);
            Ok(())
        }

        result = drive(&mut negotiation, &mut inbox, &mut primitive_events) => result,
    };

    match result {
        Err(e) => negotiation.fail(e).await,
        Ok(()) => negotiation.close().await,
    }
}

/// Start the negotiation and feed it until the inbox closes or a step fails
async fn drive(
    negotiation: &mut Negotiation,
    inbox: &mut mpsc::UnboundedReceiver<String>,
    primitive_events: &mut mpsc::UnboundedReceiver<PrimitiveEvent>,
) -> Result<(), NegotiationError> {
    let mut primitive_alive = true;
    negotiation.start().await?;

    loop {
        tokio::select! {
            msg = inbox.recv() => match msg {
                Some(text) => negotiation.on_peer_message(&text).await?,
                None => return Ok(()),
            },

            event = primitive_events.recv(), if primitive_alive => match event {
                Some(event) => negotiation.on_primitive_event(event).await?,
                None => primitive_alive = false,
            },
        }
    }
}

/// Owner's handle to a running session. Dropping it tears the session down.
pub struct SessionHandle {
    id: SessionId,
    role: Role,
    inbox: mpsc::UnboundedSender<String>,
    state: watch::Receiver<NegotiationState>,
    _shutdown: oneshot::Sender<()>,
}

impl SessionHandle {
    /// Run `negotiation` on its own task, fed by `primitive_events`
    pub fn spawn(
        negotiation: Negotiation,
        primitive_events: mpsc::UnboundedReceiver<PrimitiveEvent>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = Self {
            id: negotiation.session,
            role: negotiation.role,
            inbox: inbox_tx,
            state: negotiation.subscribe(),
            _shutdown: shutdown_tx,
        };
        tokio::spawn(session_actor(
            negotiation,
            inbox_rx,
            primitive_events,
            shutdown_rx,
        ));
        handle
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<NegotiationState> {
        self.state.clone()
    }

    /// Hand an inbound peer message to the session
    pub fn deliver(&self, payload: String) {
        if self.inbox.send(payload).is_err() {
            debug!("{} already torn down, dropping peer message", self.id);
        }
    }
}
