//! Interactive room client: `relay_cli [url] [room-id]`.
//! Creates a room when no id is given, then relays stdin lines to the peer.

use std::error::Error;

use peerlink::config::{DEFAULT_RELAY_URL, TransportConfig};
use peerlink::room::{RoomEvent, RoomProtocol};
use peerlink::transport::SignalTransport;
use tokio::io::{self, AsyncBufReadExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
    let room = args.next();

    let (transport, transport_events) = SignalTransport::websocket(TransportConfig::new(url));
    let (protocol, mut events) = RoomProtocol::start(transport, transport_events);

    let id = match room {
        Some(id) => protocol.join_room(id).await?,
        None => protocol.create_room().await?,
    };
    println!("In room {}. Type a message and press Enter:", id);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RoomEvent::PeerMessage { payload, .. } => println!("\n> Peer: {}", payload),
                RoomEvent::PeerArrived(_) => println!("\n* peer connected"),
                RoomEvent::TransportFailed(failure) => {
                    eprintln!("relay unreachable: {}", failure);
                    break;
                }
                other => println!("\n* {:?}", other),
            }
        }
    });

    let mut stdin = io::BufReader::new(io::stdin()).lines();
    while let Ok(Some(line)) = stdin.next_line().await {
        protocol.send(line);
    }

    protocol.transport().close();
    Ok(())
}
