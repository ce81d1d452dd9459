//! Peer discovery and connection negotiation through a WebSocket relay
//!
//! [`transport`] keeps one resilient connection to the relay, [`room`] speaks
//! the relay's room vocabulary over it, [`negotiation`] runs the
//! offer/answer/candidate exchange against a pluggable peer connection, and
//! [`coordinator`] wires them together so each room membership gets exactly
//! one negotiation. [`relay`] is the matching server.

pub mod config;
pub mod coordinator;
pub mod negotiation;
pub mod relay;
pub mod room;
pub mod transport;

pub use config::{ReconnectPolicy, RetryBand, TransportConfig};
pub use coordinator::{CoordinatorError, CoordinatorEvent, CredentialProvider, RoomCoordinator};
pub use negotiation::{PeerConnection, PeerConnectionFactory, Role};
pub use room::{RoomId, RoomProtocol};
pub use transport::SignalTransport;
