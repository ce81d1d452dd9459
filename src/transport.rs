//! Resilient WebSocket channel to the relay server

mod actor;
mod close_code;
mod connector;
#[cfg(test)]
pub(crate) mod mock;
mod types;

pub use actor::SignalTransport;
pub use close_code::{CloseClass, CloseCode, RetryKind};
pub use connector::{Connection, Connector, Inbound, WsConnector};
pub use types::{ConnectionState, TransportError, TransportEvent, TransportFailure};
