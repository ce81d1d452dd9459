use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

use super::close_code::CloseCode;
use super::types::TransportError;

/// What a live connection yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Closed(CloseCode),
}

/// One established connection to the relay.
///
/// `recv` must be cancel-safe: the transport actor polls it inside
/// `tokio::select!` and drops the future whenever another branch wins.
#[async_trait]
pub trait Connection: Send {
    async fn recv(&mut self) -> Inbound;
    async fn send(&mut self, payload: String) -> Result<(), TransportError>;
    async fn close(&mut self);
}

/// Dials the relay
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// tokio-tungstenite backed connector
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let url = relay_url(url, token)?;
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!("WebSocket connected to {}", url.host_str().unwrap_or("relay"));
        Ok(Box::new(WsConnection { stream }))
    }
}

/// Append the credential as the `token` query parameter
fn relay_url(server: &str, token: Option<&str>) -> Result<Url, TransportError> {
    let mut url = Url::parse(server).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url)
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Inbound {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Inbound::Text(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    let code = frame
                        .map(|f| CloseCode::new(u16::from(f.code)))
                        .unwrap_or(CloseCode::NO_STATUS);
                    return Inbound::Closed(code);
                }
                // pings are answered by tungstenite on the next read
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    return Inbound::Closed(CloseCode::ABNORMAL);
                }
                None => return Inbound::Closed(CloseCode::ABNORMAL),
            }
        }
    }

    async fn send(&mut self, payload: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("close handshake failed: {}", e);
        }
    }
}
