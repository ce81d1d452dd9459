//! The relay's plain-text control vocabulary

use super::types::RoomId;

const CREATE: &str = "CREATE";
const JOIN: &str = "JOIN";
const CREATED: &str = "CREATED";
const JOINED: &str = "JOINED";
const INVALID_ROOM: &str = "INVALID ROOM";
const PEER_CONNECTED: &str = "PEER CONNECTED";

/// Commands sent from client to relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Create,
    Join(RoomId),
}

impl ControlCommand {
    pub fn encode(&self) -> String {
        match self {
            ControlCommand::Create => CREATE.to_string(),
            ControlCommand::Join(id) => format!("{} {}", JOIN, id),
        }
    }

    /// `None` for anything that is not a control command
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == CREATE {
            return Some(ControlCommand::Create);
        }
        id_after(text, JOIN).map(ControlCommand::Join)
    }
}

/// Messages sent from relay to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomMessage {
    RoomCreated(RoomId),
    RoomJoined(RoomId),
    InvalidRoom(RoomId),
    PeerArrived,
    /// anything else, kept verbatim
    Opaque(String),
}

impl RoomMessage {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed == PEER_CONNECTED {
            return RoomMessage::PeerArrived;
        }
        if let Some(id) = id_after(trimmed, CREATED) {
            return RoomMessage::RoomCreated(id);
        }
        if let Some(id) = id_after(trimmed, JOINED) {
            return RoomMessage::RoomJoined(id);
        }
        if let Some(id) = id_after(trimmed, INVALID_ROOM) {
            return RoomMessage::InvalidRoom(id);
        }
        RoomMessage::Opaque(text.to_string())
    }

    pub fn encode(&self) -> String {
        match self {
            RoomMessage::RoomCreated(id) => format!("{} {}", CREATED, id),
            RoomMessage::RoomJoined(id) => format!("{} {}", JOINED, id),
            RoomMessage::InvalidRoom(id) => format!("{} {}", INVALID_ROOM, id),
            RoomMessage::PeerArrived => PEER_CONNECTED.to_string(),
            RoomMessage::Opaque(text) => text.clone(),
        }
    }
}

/// `<keyword> <id>`, where the id is a single whitespace-free token
fn id_after(text: &str, keyword: &str) -> Option<RoomId> {
    let rest = text.strip_prefix(keyword)?;
    let id = rest.strip_prefix(char::is_whitespace)?.trim();
    if id.is_empty() || id.contains(char::is_whitespace) {
        return None;
    }
    Some(RoomId::from(id))
}
