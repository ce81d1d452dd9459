use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::config::{ReconnectPolicy, TransportConfig};

use super::close_code::{CloseClass, CloseCode, RetryKind};
use super::connector::{Connection, Connector, Inbound, WsConnector};
use super::types::{ConnectionState, TransportError, TransportEvent, TransportFailure};

type DialResult = Result<Box<dyn Connection>, TransportError>;
type DialFuture = Pin<Box<dyn Future<Output = DialResult> + Send>>;

/// Commands sent to the transport actor
pub(crate) enum TransportCommand {
    Connect {
        reply: oneshot::Sender<Result<(), TransportError>>,
    },
    Send {
        payload: String,
    },
    Refresh {
        token: String,
    },
    SetPreamble {
        payload: Option<String>,
    },
    Close,
}

/// What woke the actor up
enum Step {
    Command(Option<TransportCommand>),
    Dialed(DialResult),
    Inbound(Inbound),
    RetryDue,
}

struct TransportActor {
    connector: Arc<dyn Connector>,
    url: String,
    token: Option<String>,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<TransportEvent>,
    queue: VecDeque<String>,
    waiters: Vec<oneshot::Sender<Result<(), TransportError>>>,
    preamble: Option<String>,
    pending_preamble: Option<String>,
    opened_before: bool,
    attempts: u32,
    band: Option<RetryKind>,
    awaiting_refresh: bool,
    connection: Option<Box<dyn Connection>>,
    dial: Option<DialFuture>,
    retry_at: Option<Instant>,
}

async fn transport_actor(
    mut actor: TransportActor,
    mut rx: mpsc::UnboundedReceiver<TransportCommand>,
) {
    loop {
        let step = {
            let dial = &mut actor.dial;
            let connection = &mut actor.connection;
            let retry_at = actor.retry_at;

            let dialed = async {
                match dial.as_mut() {
                    Some(dial) => dial.await,
                    None => std::future::pending().await,
                }
            };
            let inbound = async {
                match connection.as_mut() {
                    Some(connection) => connection.recv().await,
                    None => std::future::pending().await,
                }
            };
            let retry = async {
                match retry_at {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cmd = rx.recv() => Step::Command(cmd),
                result = dialed => Step::Dialed(result),
                msg = inbound => Step::Inbound(msg),
                _ = retry => Step::RetryDue,
            }
        };

        match step {
            Step::Command(None) | Step::Command(Some(TransportCommand::Close)) => {
                actor.shutdown().await;
                break;
            }
            Step::Command(Some(cmd)) => actor.handle_command(cmd).await,
            Step::Dialed(result) => {
                actor.dial = None;
                actor.on_dialed(result).await;
            }
            Step::Inbound(Inbound::Text(text)) => actor.emit(TransportEvent::Message(text)),
            Step::Inbound(Inbound::Closed(code)) => {
                actor.connection = None;
                actor.on_closed(code);
            }
            Step::RetryDue => {
                actor.retry_at = None;
                actor.start_dial();
            }
        }
    }
}

impl TransportActor {
    async fn handle_command(&mut self, cmd: TransportCommand) {
        match cmd {
            TransportCommand::Connect { reply } => {
                if *self.state.borrow() == ConnectionState::Open {
                    let _ = reply.send(Ok(()));
                    return;
                }
                self.waiters.push(reply);
                if self.is_idle() {
                    self.attempts = 0;
                    self.band = None;
                    self.start_dial();
                }
            }
            TransportCommand::Send { payload } => {
                self.queue.push_back(payload);
                self.flush().await;
            }
            TransportCommand::Refresh { token } => {
                info!("credential refreshed");
                self.token = Some(token);
                self.awaiting_refresh = false;
                if self.connection.is_none() && self.dial.is_none() {
                    self.retry_at = None;
                    self.attempts = 0;
                    self.band = None;
                    self.start_dial();
                }
            }
            TransportCommand::SetPreamble { payload } => self.preamble = payload,
            // the loop shuts down before dispatching here
            TransportCommand::Close => {}
        }
    }

    /// No connection, no dial in flight and nothing scheduled
    fn is_idle(&self) -> bool {
        self.connection.is_none()
            && self.dial.is_none()
            && self.retry_at.is_none()
            && !self.awaiting_refresh
    }

    fn start_dial(&mut self) {
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let token = self.token.clone();

        debug!("dialing {}", self.url);
        self.set_state(ConnectionState::Connecting);
        self.dial = Some(Box::pin(async move {
            connector.connect(&url, token.as_deref()).await
        }));
    }

    async fn on_dialed(&mut self, result: DialResult) {
        match result {
            Ok(connection) => {
                info!("connected to relay {}", self.url);
                self.connection = Some(connection);
                self.attempts = 0;
                self.band = None;
                self.set_state(ConnectionState::Open);
                self.emit(TransportEvent::Open);
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }

                if self.opened_before {
                    self.pending_preamble = self.preamble.clone();
                }
                self.opened_before = true;
                self.flush().await;
            }
            Err(e) => {
                warn!("dial failed: {}", e);
                self.emit(TransportEvent::Error(e.to_string()));
                self.set_state(ConnectionState::Disconnected);
                let kind = *self.band.get_or_insert(RetryKind::Slow);
                self.schedule_retry(kind);
            }
        }
    }

    /// Write the preamble and then the queue, oldest first
    async fn flush(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };

        let mut failure = None;
        if let Some(preamble) = self.pending_preamble.take() {
            debug!("sending preamble");
            if let Err(e) = connection.send(preamble).await {
                failure = Some(e);
            }
        }
        while failure.is_none() {
            let Some(payload) = self.queue.front() else {
                break;
            };
            match connection.send(payload.clone()).await {
                Ok(()) => {
                    self.queue.pop_front();
                }
                Err(e) => failure = Some(e),
            }
        }

        if let Some(e) = failure {
            warn!("{}, {} message(s) stay queued", e, self.queue.len());
            self.connection = None;
            self.on_closed(CloseCode::ABNORMAL);
        }
    }

    fn on_closed(&mut self, code: CloseCode) {
        self.set_state(ConnectionState::Disconnected);
        self.emit(TransportEvent::Closed(code));

        match code.classify() {
            CloseClass::Retry(kind) => {
                info!("relay closed with {}, reconnecting ({:?} band)", code, kind);
                self.band = Some(kind);
                self.schedule_retry(kind);
            }
            CloseClass::CredentialExpired => {
                warn!("relay closed with {}, waiting for a fresh credential", code);
                self.awaiting_refresh = true;
                self.emit(TransportEvent::RefreshNeeded);
            }
            CloseClass::Fatal => self.fail(TransportFailure::FatalClose(code)),
        }
    }

    fn schedule_retry(&mut self, kind: RetryKind) {
        if self.attempts >= self.policy.max_attempts {
            self.fail(TransportFailure::RetriesExhausted(self.attempts));
            return;
        }

        self.attempts += 1;
        let delay = self.policy.band(kind).delay(self.attempts);
        debug!("reconnect attempt {} in {:?}", self.attempts, delay);
        self.retry_at = Some(Instant::now() + delay);
        self.emit(TransportEvent::Reconnecting {
            attempt: self.attempts,
            delay,
        });
    }

    fn fail(&mut self, failure: TransportFailure) {
        error!("transport failed: {}", failure);
        self.retry_at = None;
        self.band = None;
        self.awaiting_refresh = false;
        self.set_state(ConnectionState::Closed);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(TransportError::Failed(failure)));
        }
        self.emit(TransportEvent::Failed(failure));
    }

    async fn shutdown(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
        self.dial = None;
        self.retry_at = None;
        if !self.queue.is_empty() {
            debug!("abandoning {} queued message(s)", self.queue.len());
        }
        self.queue.clear();
        self.set_state(ConnectionState::Closed);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(TransportError::Closed));
        }
        info!("transport closed");
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("transport state {:?} -> {:?}", previous, state);
        }
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

/// Handle to the transport actor.
///
/// Clones drive the same underlying connection; the actor stops once
/// [`close`](Self::close) is called or every handle is dropped.
#[derive(Clone)]
pub struct SignalTransport {
    tx: mpsc::UnboundedSender<TransportCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl SignalTransport {
    /// Spawn the transport actor. Nothing is dialed until [`connect`](Self::connect).
    pub fn start(
        config: TransportConfig,
        connector: impl Connector,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let connector: Arc<dyn Connector> = Arc::new(connector);

        let actor = TransportActor {
            connector,
            url: config.url,
            token: config.token,
            policy: config.reconnect,
            state: state_tx,
            events: event_tx,
            queue: VecDeque::new(),
            waiters: Vec::new(),
            preamble: None,
            pending_preamble: None,
            opened_before: false,
            attempts: 0,
            band: None,
            awaiting_refresh: false,
            connection: None,
            dial: None,
            retry_at: None,
        };
        tokio::spawn(transport_actor(actor, rx));

        (Self { tx, state: state_rx }, event_rx)
    }

    /// Spawn a transport that talks WebSocket to `config.url`
    pub fn websocket(config: TransportConfig) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        Self::start(config, WsConnector)
    }

    /// Resolve once the connection is Open.
    ///
    /// Concurrent calls share one dial. Fails only when the transport gives
    /// up for good or is closed.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(TransportCommand::Connect { reply: reply_tx })
            .map_err(|_| TransportError::Closed)?;
        reply_rx.await.map_err(|_| TransportError::Closed)?
    }

    /// Queue a text frame; it is written once the connection is Open
    pub fn send(&self, payload: impl Into<String>) {
        let payload = payload.into();
        if self.tx.send(TransportCommand::Send { payload }).is_err() {
            debug!("transport closed, dropping outgoing message");
        }
    }

    /// Supply a new credential and reconnect right away if disconnected
    pub fn refresh(&self, token: impl Into<String>) {
        let _ = self.tx.send(TransportCommand::Refresh {
            token: token.into(),
        });
    }

    /// Frame written ahead of the queue every time the connection reopens
    pub fn set_preamble(&self, payload: Option<String>) {
        let _ = self.tx.send(TransportCommand::SetPreamble { payload });
    }

    /// Abandon the connection: queued messages are dropped and pending
    /// `connect` calls fail with [`TransportError::Closed`].
    pub fn close(&self) {
        let _ = self.tx.send(TransportCommand::Close);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

impl fmt::Debug for SignalTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalTransport")
            .field("state", &self.state())
            .finish()
    }
}
