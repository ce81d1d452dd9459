//! In-memory relay for driving the transport in tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::close_code::CloseCode;
use super::connector::{Connection, Connector, Inbound};
use super::types::TransportError;

/// One recorded dial
#[derive(Debug, Clone)]
pub(crate) struct Dial {
    pub at: Instant,
    pub token: Option<String>,
}

struct Shared {
    refuse: AtomicBool,
    dials: Mutex<Vec<Dial>>,
    links: mpsc::UnboundedSender<ServerLink>,
}

pub(crate) struct MockConnector {
    shared: Arc<Shared>,
}

/// Server side of the mock: hands out one [`ServerLink`] per accepted dial
pub(crate) struct MockRelay {
    shared: Arc<Shared>,
    links: mpsc::UnboundedReceiver<ServerLink>,
}

pub(crate) fn mock_relay() -> (MockConnector, MockRelay) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        refuse: AtomicBool::new(false),
        dials: Mutex::new(Vec::new()),
        links: tx,
    });
    (
        MockConnector {
            shared: Arc::clone(&shared),
        },
        MockRelay { shared, links: rx },
    )
}

impl MockRelay {
    pub async fn accept(&mut self) -> ServerLink {
        self.links.recv().await.expect("connector dropped")
    }

    /// Make subsequent dials fail
    pub fn refuse(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn dials(&self) -> Vec<Dial> {
        self.shared.dials.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _url: &str,
        token: Option<&str>,
    ) -> Result<Box<dyn Connection>, TransportError> {
        self.shared.dials.lock().unwrap().push(Dial {
            at: Instant::now(),
            token: token.map(str::to_owned),
        });
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let _ = self.shared.links.send(ServerLink {
            to_client,
            from_client,
        });
        Ok(Box::new(MockConnection { inbound, outbound }))
    }
}

/// The relay's end of one mock connection
pub(crate) struct ServerLink {
    to_client: mpsc::UnboundedSender<Inbound>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl ServerLink {
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.to_client.send(Inbound::Text(text.into()));
    }

    pub fn close(&self, code: u16) {
        let _ = self.to_client.send(Inbound::Closed(CloseCode::new(code)));
    }

    pub async fn next_sent(&mut self) -> String {
        self.from_client.recv().await.expect("client side dropped")
    }
}

struct MockConnection {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn recv(&mut self) -> Inbound {
        self.inbound
            .recv()
            .await
            .unwrap_or(Inbound::Closed(CloseCode::ABNORMAL))
    }

    async fn send(&mut self, payload: String) -> Result<(), TransportError> {
        self.outbound
            .send(payload)
            .map_err(|_| TransportError::Send("link dropped".to_string()))
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}
