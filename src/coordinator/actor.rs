use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::TransportConfig;
use crate::negotiation::{
    Negotiation, NegotiationError, NegotiationEvent, PeerConnectionFactory, Role, SessionEvent,
    SessionHandle, SessionId,
};
use crate::room::{Room, RoomEvent, RoomId, RoomProtocol, RoomRole};
use crate::transport::SignalTransport;

use super::types::{
    CoordinatorError, CoordinatorEvent, CredentialProvider, RoomContext, SessionSummary,
};

/// Commands sent to the coordinator actor
pub(crate) enum CoordinatorCommand {
    Session {
        reply: oneshot::Sender<Option<SessionSummary>>,
    },
    Leave,
}

struct CoordinatorActor {
    protocol: RoomProtocol,
    factory: Arc<dyn PeerConnectionFactory>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    context: RoomContext,
    next_session: u64,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
    events: async_channel::Sender<CoordinatorEvent>,
}

async fn coordinator_actor(
    mut actor: CoordinatorActor,
    mut rx: mpsc::UnboundedReceiver<CoordinatorCommand>,
    mut room_events: mpsc::UnboundedReceiver<RoomEvent>,
    mut session_events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(cmd) => actor.handle_command(cmd),
                None => break,
            },
            event = room_events.recv() => match event {
                Some(event) => actor.on_room_event(event).await,
                None => {
                    debug!("room protocol stopped, coordinator exiting");
                    break;
                }
            },
            Some(event) = session_events.recv() => actor.on_session_event(event),
        }
    }
    actor.end_session();
}

impl CoordinatorActor {
    fn handle_command(&mut self, cmd: CoordinatorCommand) {
        match cmd {
            CoordinatorCommand::Session { reply } => {
                let _ = reply.send(self.context.summary());
            }
            CoordinatorCommand::Leave => {
                self.protocol.leave();
                self.end_session();
                if let Some(room) = self.context.room.take() {
                    info!("left room {}", room.id);
                }
            }
        }
    }

    async fn on_room_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::Created(id) => {
                self.context.room = Some(Room {
                    id: id.clone(),
                    role: RoomRole::Creator,
                });
                self.emit(CoordinatorEvent::RoomCreated(id));
            }

            RoomEvent::Joined(id) => {
                self.context.room = Some(Room {
                    id: id.clone(),
                    role: RoomRole::Joiner,
                });
                self.emit(CoordinatorEvent::RoomJoined(id.clone()));
                self.start_session(id, Role::Follower).await;
            }

            RoomEvent::PeerArrived(id) => {
                if !matches!(self.context.room, Some(Room { role: RoomRole::Creator, .. })) {
                    debug!("peer arrived in {} but only the creator leads, ignoring", id);
                    return;
                }
                if self.context.has_live_session() {
                    info!("peer arrived in {} but a session is already running, ignoring", id);
                    return;
                }
                self.start_session(id, Role::Leader).await;
            }

            RoomEvent::Rejoined(id) => {
                debug!("rejoined {}, keeping the current session", id);
            }

            RoomEvent::RoomLost(id) => {
                self.end_session();
                self.context.room = None;
                self.emit(CoordinatorEvent::RoomClosed(id));
            }

            RoomEvent::PeerMessage { room, payload } => match &self.context.session {
                Some(session) => session.deliver(payload),
                None => debug!("no session in {}, dropping peer message", room),
            },

            RoomEvent::Disconnected(code) => info!("relay disconnected ({})", code),
            RoomEvent::Reconnected => info!("relay reconnected"),
            RoomEvent::RefreshNeeded => self.on_refresh_needed(),

            RoomEvent::TransportFailed(failure) => {
                error!("relay unreachable: {}", failure);
                self.end_session();
                if let Some(room) = self.context.room.take() {
                    info!("room {} abandoned", room.id);
                }
                self.emit(CoordinatorEvent::ServerUnreachable(failure));
            }
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        let current = self.context.session.as_ref().map(SessionHandle::id);
        if current != Some(event.session) {
            debug!("dropping event from retired {}", event.session);
            return;
        }
        let Some(room) = self.context.room_id() else {
            return;
        };

        match event.event {
            NegotiationEvent::Outbound(text) => self.protocol.send(text),
            NegotiationEvent::Connected => {
                info!("peer connected in room {}", room);
                self.emit(CoordinatorEvent::PeerConnected(room));
            }
            NegotiationEvent::Failed(error) => {
                self.context.session = None;
                self.emit(CoordinatorEvent::NegotiationFailed { room, error });
            }
        }
    }

    async fn start_session(&mut self, room: RoomId, role: Role) {
        self.end_session();

        let (primitive_tx, primitive_rx) = mpsc::unbounded_channel();
        let primitive = match self.factory.create(role, primitive_tx).await {
            Ok(primitive) => primitive,
            Err(e) => {
                error!("could not create a peer connection for {}: {}", room, e);
                self.emit(CoordinatorEvent::NegotiationFailed {
                    room,
                    error: NegotiationError::Primitive(e),
                });
                return;
            }
        };

        self.next_session += 1;
        let id = SessionId(self.next_session);
        info!("{} negotiating in room {} as {:?}", id, room, role);
        let negotiation = Negotiation::new(id, role, primitive, self.session_tx.clone());
        self.context.session = Some(SessionHandle::spawn(negotiation, primitive_rx));
    }

    fn end_session(&mut self) {
        if let Some(session) = self.context.session.take() {
            debug!("tearing down {}", session.id());
        }
    }

    fn on_refresh_needed(&self) {
        let Some(provider) = &self.credentials else {
            self.emit(CoordinatorEvent::RefreshNeeded);
            return;
        };

        let provider = Arc::clone(provider);
        let transport = self.protocol.transport().clone();
        let room = self.context.room_id();
        let events = self.events.clone();
        tokio::spawn(async move {
            match provider.fetch_token(room.as_ref()).await {
                Ok(token) => transport.refresh(token),
                Err(e) => {
                    warn!("credential refresh failed: {}", e);
                    let _ = events.send(CoordinatorEvent::RefreshNeeded).await;
                }
            }
        });
    }

    fn emit(&self, event: CoordinatorEvent) {
        let _ = self.events.try_send(event);
    }
}

/// Handle to the room coordinator.
///
/// Starts a Follower session when a join succeeds and a Leader session when
/// a peer arrives in a created room, and relays session traffic through the
/// room protocol.
#[derive(Clone)]
pub struct RoomCoordinator {
    tx: mpsc::UnboundedSender<CoordinatorCommand>,
    protocol: RoomProtocol,
}

impl RoomCoordinator {
    pub fn start(
        protocol: RoomProtocol,
        room_events: mpsc::UnboundedReceiver<RoomEvent>,
        factory: impl PeerConnectionFactory,
        credentials: Option<Arc<dyn CredentialProvider>>,
    ) -> (Self, async_channel::Receiver<CoordinatorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = async_channel::unbounded();
        let factory: Arc<dyn PeerConnectionFactory> = Arc::new(factory);

        let actor = CoordinatorActor {
            protocol: protocol.clone(),
            factory,
            credentials,
            context: RoomContext::default(),
            next_session: 0,
            session_tx,
            events: event_tx,
        };
        tokio::spawn(coordinator_actor(actor, rx, room_events, session_rx));

        (Self { tx, protocol }, event_rx)
    }

    /// Build the whole stack over a WebSocket transport
    pub fn websocket(
        config: TransportConfig,
        factory: impl PeerConnectionFactory,
        credentials: Option<Arc<dyn CredentialProvider>>,
    ) -> (Self, async_channel::Receiver<CoordinatorEvent>) {
        let (transport, transport_events) = SignalTransport::websocket(config);
        let (protocol, room_events) = RoomProtocol::start(transport, transport_events);
        Self::start(protocol, room_events, factory, credentials)
    }

    pub async fn connect(&self) -> Result<(), CoordinatorError> {
        self.protocol.transport().connect().await?;
        Ok(())
    }

    pub async fn create_room(&self) -> Result<RoomId, CoordinatorError> {
        Ok(self.protocol.create_room().await?)
    }

    pub async fn join_room(&self, id: impl Into<RoomId>) -> Result<RoomId, CoordinatorError> {
        Ok(self.protocol.join_room(id).await?)
    }

    /// Leave the room and tear down its session
    pub fn leave(&self) {
        let _ = self.tx.send(CoordinatorCommand::Leave);
    }

    /// Reconnect with a fresh credential
    pub fn refresh(&self, token: impl Into<String>) {
        self.protocol.transport().refresh(token);
    }

    /// The running session, if any. Fails once the coordinator has stopped.
    pub async fn session(&self) -> Result<Option<SessionSummary>, CoordinatorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoordinatorCommand::Session { reply: reply_tx })
            .map_err(|_| CoordinatorError::Stopped)?;
        reply_rx.await.map_err(|_| CoordinatorError::Stopped)
    }

    /// Abandon the relay connection for good
    pub fn close(&self) {
        self.protocol.transport().close();
    }

    pub fn protocol(&self) -> &RoomProtocol {
        &self.protocol
    }
}
