//! Offer/answer/ICE negotiation driving an external peer connection

mod engine;
#[cfg(test)]
pub(crate) mod mock;
mod primitive;
mod signal;
mod state;

pub use engine::{Negotiation, SessionHandle};
pub use primitive::{PeerConnection, PeerConnectionFactory, PrimitiveError, PrimitiveEvent};
pub use signal::{IceCandidate, PeerSignal, SdpType, SessionDescription};
pub use state::{
    NegotiationError, NegotiationEvent, NegotiationState, Role, SessionEvent, SessionId,
    Sequencing,
};
