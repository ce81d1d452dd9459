use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::transport::{SignalTransport, TransportError, TransportEvent, TransportFailure};

use super::messages::{ControlCommand, RoomMessage};
use super::types::{Room, RoomError, RoomEvent, RoomId, RoomRole};

type Reply = oneshot::Sender<Result<RoomId, RoomError>>;

/// Commands sent to the room actor
pub(crate) enum RoomCommand {
    Create { reply: Reply },
    Join { id: RoomId, reply: Reply },
    Send { payload: String },
    Leave,
    Current { reply: oneshot::Sender<Option<Room>> },
}

/// The one create/join request waiting for the relay's answer
enum Pending {
    Create(Reply),
    Join { id: RoomId, reply: Reply },
}

impl Pending {
    fn is_abandoned(&self) -> bool {
        match self {
            Pending::Create(reply) | Pending::Join { reply, .. } => reply.is_closed(),
        }
    }

    fn reject(self, err: RoomError) {
        match self {
            Pending::Create(reply) | Pending::Join { reply, .. } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

struct RoomActor {
    transport: SignalTransport,
    events: mpsc::UnboundedSender<RoomEvent>,
    room: Option<Room>,
    pending: Option<Pending>,
    /// membership awaiting re-confirmation after a reconnect
    rejoining: bool,
    disconnected: bool,
}

async fn room_actor(
    mut actor: RoomActor,
    mut rx: mpsc::UnboundedReceiver<RoomCommand>,
    mut transport_events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(cmd) => actor.handle_command(cmd),
                None => break,
            },
            event = transport_events.recv() => match event {
                Some(event) => actor.on_transport_event(event),
                None => {
                    debug!("transport stopped, room protocol exiting");
                    break;
                }
            },
        }
    }
}

impl RoomActor {
    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Create { reply } => {
                if let Err(e) = self.ready_for_request() {
                    let _ = reply.send(Err(e));
                    return;
                }
                info!("requesting a new room");
                self.transport.send(ControlCommand::Create.encode());
                self.pending = Some(Pending::Create(reply));
            }
            RoomCommand::Join { id, reply } => {
                if let Err(e) = self.ready_for_request() {
                    let _ = reply.send(Err(e));
                    return;
                }
                info!("joining room {}", id);
                self.transport.send(ControlCommand::Join(id.clone()).encode());
                self.pending = Some(Pending::Join { id, reply });
            }
            RoomCommand::Send { payload } => {
                if self.room.is_some() {
                    self.transport.send(payload);
                } else {
                    warn!("not in a room, dropping outgoing message");
                }
            }
            RoomCommand::Leave => {
                if let Some(room) = self.room.take() {
                    info!("left room {}", room.id);
                    self.transport.set_preamble(None);
                    self.rejoining = false;
                }
            }
            RoomCommand::Current { reply } => {
                let _ = reply.send(self.room.clone());
            }
        }
    }

    fn ready_for_request(&mut self) -> Result<(), RoomError> {
        if let Some(room) = &self.room {
            return Err(RoomError::AlreadyMember(room.id.clone()));
        }
        if self.pending.as_ref().is_some_and(Pending::is_abandoned) {
            debug!("previous room request was abandoned by its caller");
            self.pending = None;
        }
        if self.pending.is_some() {
            return Err(RoomError::RequestPending);
        }
        Ok(())
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                if self.disconnected {
                    self.disconnected = false;
                    self.emit(RoomEvent::Reconnected);
                }
            }
            TransportEvent::Message(text) => self.on_relay_message(text),
            TransportEvent::Closed(code) => {
                self.disconnected = true;
                if let Some(room) = &self.room {
                    debug!("disconnected while in room {}, will rejoin", room.id);
                    self.rejoining = true;
                }
                self.emit(RoomEvent::Disconnected(code));
            }
            TransportEvent::Reconnecting { attempt, delay } => {
                debug!("relay reconnect attempt {} in {:?}", attempt, delay);
            }
            TransportEvent::RefreshNeeded => self.emit(RoomEvent::RefreshNeeded),
            TransportEvent::Error(e) => debug!("transport error: {}", e),
            TransportEvent::Failed(failure) => self.on_transport_failed(failure),
        }
    }

    fn on_transport_failed(&mut self, failure: TransportFailure) {
        if let Some(pending) = self.pending.take() {
            pending.reject(RoomError::Transport(TransportError::Failed(failure)));
        }
        if let Some(room) = self.room.take() {
            info!("room {} closed: {}", room.id, failure);
        }
        self.transport.set_preamble(None);
        self.rejoining = false;
        self.emit(RoomEvent::TransportFailed(failure));
    }

    fn on_relay_message(&mut self, text: String) {
        match RoomMessage::parse(&text) {
            RoomMessage::RoomCreated(id) => match self.pending.take() {
                Some(Pending::Create(reply)) => {
                    self.enter(id.clone(), RoomRole::Creator);
                    let _ = reply.send(Ok(id.clone()));
                    self.emit(RoomEvent::Created(id));
                }
                other => {
                    self.pending = other;
                    warn!("unexpected CREATED {}", id);
                }
            },

            RoomMessage::RoomJoined(id) => {
                if self.is_rejoining(&id) {
                    info!("rejoined room {}", id);
                    self.rejoining = false;
                    self.emit(RoomEvent::Rejoined(id));
                    return;
                }
                match self.pending.take() {
                    Some(Pending::Join { id: wanted, reply }) if wanted == id => {
                        self.enter(id.clone(), RoomRole::Joiner);
                        let _ = reply.send(Ok(id.clone()));
                        self.emit(RoomEvent::Joined(id));
                    }
                    other => {
                        self.pending = other;
                        warn!("unexpected JOINED {}", id);
                    }
                }
            }

            RoomMessage::InvalidRoom(id) => {
                if self.is_rejoining(&id) {
                    warn!("room {} no longer exists on the relay", id);
                    self.room = None;
                    self.rejoining = false;
                    self.transport.set_preamble(None);
                    self.emit(RoomEvent::RoomLost(id));
                    return;
                }
                match self.pending.take() {
                    Some(Pending::Join { id: wanted, reply }) if wanted == id => {
                        warn!("invalid room {}", id);
                        let _ = reply.send(Err(RoomError::InvalidRoom(id)));
                    }
                    other => {
                        self.pending = other;
                        warn!("unexpected INVALID ROOM {}", id);
                    }
                }
            }

            RoomMessage::PeerArrived => match &self.room {
                Some(room) => {
                    info!("peer arrived in room {}", room.id);
                    self.emit(RoomEvent::PeerArrived(room.id.clone()));
                }
                None => debug!("PEER CONNECTED outside a room, ignoring"),
            },

            RoomMessage::Opaque(payload) => match &self.room {
                Some(room) => self.emit(RoomEvent::PeerMessage {
                    room: room.id.clone(),
                    payload,
                }),
                None => debug!("dropping relay message received outside a room"),
            },
        }
    }

    fn is_rejoining(&self, id: &RoomId) -> bool {
        self.rejoining && self.room.as_ref().is_some_and(|room| &room.id == id)
    }

    fn enter(&mut self, id: RoomId, role: RoomRole) {
        info!("entered room {} as {:?}", id, role);
        self.transport
            .set_preamble(Some(ControlCommand::Join(id.clone()).encode()));
        self.room = Some(Room { id, role });
        self.rejoining = false;
    }

    fn emit(&self, event: RoomEvent) {
        let _ = self.events.send(event);
    }
}

/// Handle to the room protocol actor
#[derive(Clone)]
pub struct RoomProtocol {
    tx: mpsc::UnboundedSender<RoomCommand>,
    transport: SignalTransport,
}

impl RoomProtocol {
    /// Spawn the room actor on top of a transport and its event stream
    pub fn start(
        transport: SignalTransport,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<RoomEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let actor = RoomActor {
            transport: transport.clone(),
            events: event_tx,
            room: None,
            pending: None,
            rejoining: false,
            disconnected: false,
        };
        tokio::spawn(room_actor(actor, rx, transport_events));

        (Self { tx, transport }, event_rx)
    }

    /// Ask the relay for a new room; resolves with the assigned id
    pub async fn create_room(&self) -> Result<RoomId, RoomError> {
        self.transport.connect().await?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Create { reply: reply_tx })
            .map_err(|_| RoomError::Stopped)?;
        reply_rx.await.map_err(|_| RoomError::Stopped)?
    }

    /// Join an existing room; rejects with [`RoomError::InvalidRoom`] if the relay does not know it
    pub async fn join_room(&self, id: impl Into<RoomId>) -> Result<RoomId, RoomError> {
        self.transport.connect().await?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Join {
                id: id.into(),
                reply: reply_tx,
            })
            .map_err(|_| RoomError::Stopped)?;
        reply_rx.await.map_err(|_| RoomError::Stopped)?
    }

    /// Relay an opaque message to the other member
    pub fn send(&self, payload: impl Into<String>) {
        let _ = self.tx.send(RoomCommand::Send {
            payload: payload.into(),
        });
    }

    /// Forget the current membership
    pub fn leave(&self) {
        let _ = self.tx.send(RoomCommand::Leave);
    }

    pub async fn current(&self) -> Option<Room> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(RoomCommand::Current { reply: reply_tx }).ok()?;
        reply_rx.await.ok().flatten()
    }

    pub fn transport(&self) -> &SignalTransport {
        &self.transport
    }
}
