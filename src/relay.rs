//! WebSocket relay that pairs peers in rooms and forwards their messages

mod actor;
mod server;
mod types;

pub use actor::RoomManagerHandle;
pub use server::{DEFAULT_RELAY_PORT, RelayServer};
pub use types::{MAX_MEMBERS, MemberId, MemberTx, OutboundMessage, RelayError};
