use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use crate::room::{ControlCommand, RoomMessage};

use super::actor::{RelayCommand, RoomManagerHandle, room_manager_actor};
use super::types::{MemberId, OutboundMessage};

pub const DEFAULT_RELAY_PORT: u16 = 8080;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket relay pairing two peers per room
pub struct RelayServer {
    listener: TcpListener,
    handle: RoomManagerHandle,
}

impl RelayServer {
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (tx, rx) = mpsc::channel::<RelayCommand>(1024);
        tokio::spawn(room_manager_actor(rx));

        Ok(Self {
            listener,
            handle: RoomManagerHandle { tx },
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> std::io::Result<()> {
        info!("Relay listening on {}", self.listener.local_addr()?);

        loop {
            let (stream, addr) = self.listener.accept().await?;
            let handle = self.handle.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

/// Ping/pong bookkeeping for one connection
struct Keepalive {
    ticker: Interval,
    timeout: Duration,
    pong_deadline: Option<Instant>,
}

#[derive(Debug, PartialEq, Eq)]
enum Beat {
    Ping,
    Dead,
}

impl Keepalive {
    fn new(period: Duration, timeout: Duration) -> Self {
        Self {
            ticker: time::interval(period),
            timeout,
            pong_deadline: None,
        }
    }

    /// Resolves when a ping is due or the member stopped answering
    async fn beat(&mut self) -> Beat {
        let deadline = self.pong_deadline;
        let expired = async {
            match deadline {
                Some(deadline) => time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = self.ticker.tick() => {
                if self.pong_deadline.is_some() {
                    return Beat::Dead;
                }
                self.pong_deadline = Some(Instant::now() + self.timeout);
                Beat::Ping
            }
            _ = expired => Beat::Dead,
        }
    }

    fn pong(&mut self) {
        self.pong_deadline = None;
    }
}

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Drain relayed text and control frames into the socket
async fn write_loop(
    mut ws_tx: WsSink,
    mut relayed: mpsc::UnboundedReceiver<OutboundMessage>,
    mut control: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        let msg = tokio::select! {
            Some(msg) = relayed.recv() => Message::Text(msg.into_inner()),
            Some(msg) = control.recv() => msg,
            else => break,
        };
        if ws_tx.send(msg).await.is_err() {
            break;
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RoomManagerHandle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (ws_tx, mut ws_rx) = ws_stream.split();

    let member = MemberId::next();
    info!("{} connected as {}", addr, member);

    let (tx, rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(write_loop(ws_tx, rx, ctrl_rx));

    let mut keepalive = Keepalive::new(PING_INTERVAL, PONG_TIMEOUT);
    let mut in_room = false;

    loop {
        let msg = tokio::select! {
            beat = keepalive.beat() => match beat {
                Beat::Ping => {
                    if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                        break;
                    }
                    continue;
                }
                Beat::Dead => {
                    warn!("{} stopped answering pings", member);
                    break;
                }
            },
            msg = ws_rx.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(text.as_str(), &tx, &handle, member, &mut in_room).await;
            }
            Some(Ok(Message::Pong(_))) => keepalive.pong(),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("{} socket error: {}", member, e);
                break;
            }
        }
    }

    if in_room {
        handle.leave_room(member).await;
    }
    writer.abort();
    info!("{} ({}) disconnected", member, addr);

    Ok(())
}

async fn handle_text_message(
    text: &str,
    tx: &mpsc::UnboundedSender<OutboundMessage>,
    handle: &RoomManagerHandle,
    member: MemberId,
    in_room: &mut bool,
) {
    match ControlCommand::parse(text) {
        Some(ControlCommand::Create) => match handle.create_room(member, tx.clone()).await {
            Ok(_) => *in_room = true,
            Err(e) => error!("create failed for {}: {}", member, e),
        },

        Some(ControlCommand::Join(id)) => {
            match handle.join_room(id.clone(), member, tx.clone()).await {
                Ok(()) => *in_room = true,
                Err(e) => {
                    debug!("{} could not join: {}", member, e);
                    *in_room = false;
                    let invalid = RoomMessage::InvalidRoom(id).encode();
                    let _ = tx.send(OutboundMessage::from(invalid));
                }
            }
        }

        None if *in_room => handle.forward(member, text.to_string()).await,

        None => debug!("{} sent a message outside a room, dropping", member),
    }
}
