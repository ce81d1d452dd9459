use std::time::Duration;

use thiserror::Error;

use super::close_code::CloseCode;

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("transport closed")]
    Closed,

    #[error(transparent)]
    Failed(#[from] TransportFailure),
}

/// Why the transport stopped reconnecting for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportFailure {
    #[error("gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),

    #[error("relay closed the connection with code {0}")]
    FatalClose(CloseCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// permanently failed or closed by the owner
    Closed,
}

/// Events emitted by the transport actor, in the order they happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    /// inbound text frame
    Message(String),
    Closed(CloseCode),
    Reconnecting { attempt: u32, delay: Duration },
    /// credential expired; call `refresh(token)` to reconnect
    RefreshNeeded,
    Error(String),
    Failed(TransportFailure),
}
