//! Room lifecycle on top of the relay transport

mod actor;
mod messages;
mod types;

pub use actor::RoomProtocol;
pub use messages::{ControlCommand, RoomMessage};
pub use types::{Room, RoomError, RoomEvent, RoomId, RoomRole};
