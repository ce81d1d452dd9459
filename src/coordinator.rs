//! Ties room membership to exactly one negotiation session

mod actor;
mod types;

pub use actor::RoomCoordinator;
pub use types::{CoordinatorError, CoordinatorEvent, CredentialProvider, SessionSummary};
