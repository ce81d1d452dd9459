use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::room::{RoomId, RoomMessage};

use super::types::{MemberId, MemberTx, OutboundMessage, RelayError, RelayRoom};

/// Commands sent to the room manager actor
pub(crate) enum RelayCommand {
    Create {
        member: MemberId,
        tx: MemberTx,
        reply: oneshot::Sender<RoomId>,
    },
    Join {
        id: RoomId,
        member: MemberId,
        tx: MemberTx,
        reply: oneshot::Sender<Result<(), RelayError>>,
    },
    Forward {
        member: MemberId,
        payload: String,
    },
    Leave {
        member: MemberId,
    },
}

#[derive(Default)]
struct Rooms {
    rooms: HashMap<RoomId, RelayRoom>,
    member_rooms: HashMap<MemberId, RoomId>,
}

impl Rooms {
    fn unused_id(&self) -> RoomId {
        loop {
            let id = RoomId::generate();
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }

    fn leave(&mut self, member: MemberId) {
        let Some(id) = self.member_rooms.remove(&member) else {
            return;
        };
        if let Some(room) = self.rooms.get_mut(&id) {
            room.members.remove(&member);
            if room.members.is_empty() {
                self.rooms.remove(&id);
                info!("Room {} removed (empty)", id);
            }
        }
        info!("{} left room {}", member, id);
    }
}

pub(crate) async fn room_manager_actor(mut rx: mpsc::Receiver<RelayCommand>) {
    let mut state = Rooms::default();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RelayCommand::Create { member, tx, reply } => {
                state.leave(member);
                let id = state.unused_id();

                let created = RoomMessage::RoomCreated(id.clone()).encode();
                let _ = tx.send(OutboundMessage::from(created));

                let mut room = RelayRoom::default();
                room.members.insert(member, tx);
                state.rooms.insert(id.clone(), room);
                state.member_rooms.insert(member, id.clone());

                info!("Room created: {} by {}", id, member);
                let _ = reply.send(id);
            }

            RelayCommand::Join {
                id,
                member,
                tx,
                reply,
            } => {
                state.leave(member);
                let result = match state.rooms.get_mut(&id) {
                    Some(room) if !room.is_full() => {
                        // the joiner hears JOINED before anything the other member sends
                        let joined = RoomMessage::RoomJoined(id.clone()).encode();
                        let _ = tx.send(OutboundMessage::from(joined));
                        let arrived = OutboundMessage::from(RoomMessage::PeerArrived.encode());
                        room.broadcast(member, &arrived);
                        room.members.insert(member, tx);
                        state.member_rooms.insert(member, id.clone());

                        info!("{} joined room {}", member, id);
                        Ok(())
                    }
                    _ => Err(RelayError::RoomUnavailable(id)),
                };

                let _ = reply.send(result);
            }

            RelayCommand::Forward { member, payload } => {
                let room = state
                    .member_rooms
                    .get(&member)
                    .and_then(|id| state.rooms.get(id));
                match room {
                    Some(room) => room.broadcast(member, &OutboundMessage::from(payload)),
                    None => debug!("{} is not in a room, dropping message", member),
                }
            }

            RelayCommand::Leave { member } => state.leave(member),
        }
    }
}

/// Handle to communicate with the room manager actor
#[derive(Clone)]
pub struct RoomManagerHandle {
    pub(crate) tx: mpsc::Sender<RelayCommand>,
}

impl RoomManagerHandle {
    /// Create a new room and become its first member; `tx` receives `CREATED <id>`
    pub async fn create_room(&self, member: MemberId, tx: MemberTx) -> Result<RoomId, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .tx
            .send(RelayCommand::Create {
                member,
                tx,
                reply: reply_tx,
            })
            .await;
        reply_rx
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))
    }

    /// Join an existing room that still has space; `tx` receives `JOINED <id>`
    pub async fn join_room(
        &self,
        id: RoomId,
        member: MemberId,
        tx: MemberTx,
    ) -> Result<(), RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .tx
            .send(RelayCommand::Join {
                id,
                member,
                tx,
                reply: reply_tx,
            })
            .await;
        reply_rx
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))?
    }

    /// Pass an opaque message to the other members of the sender's room
    pub async fn forward(&self, member: MemberId, payload: String) {
        let _ = self
            .tx
            .send(RelayCommand::Forward { member, payload })
            .await;
    }

    pub async fn leave_room(&self, member: MemberId) {
        let _ = self.tx.send(RelayCommand::Leave { member }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RoomManagerHandle {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(room_manager_actor(rx));
        RoomManagerHandle { tx }
    }

    fn member() -> (MemberId, MemberTx, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MemberId::next(), tx, rx)
    }

    #[tokio::test]
    async fn create_assigns_five_digit_id() {
        let handle = manager();
        let (a, a_tx, mut a_rx) = member();
        let id = handle.create_room(a, a_tx).await.unwrap();
        assert_eq!(id.as_str().len(), 5);
        assert_eq!(a_rx.recv().await.unwrap().as_str(), format!("CREATED {}", id));
    }

    #[tokio::test]
    async fn join_notifies_existing_member() {
        let handle = manager();
        let (a, a_tx, mut a_rx) = member();
        let (b, b_tx, mut b_rx) = member();

        let id = handle.create_room(a, a_tx).await.unwrap();
        a_rx.recv().await.unwrap();
        handle.join_room(id.clone(), b, b_tx).await.unwrap();

        assert_eq!(a_rx.recv().await.unwrap().as_str(), "PEER CONNECTED");
        assert_eq!(b_rx.recv().await.unwrap().as_str(), format!("JOINED {}", id));
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_unknown_room_fails() {
        let handle = manager();
        let (b, b_tx, _b_rx) = member();
        let result = handle.join_room(RoomId::from("42"), b, b_tx).await;
        assert!(matches!(result, Err(RelayError::RoomUnavailable(id)) if id.as_str() == "42"));
    }

    #[tokio::test]
    async fn third_member_is_refused() {
        let handle = manager();
        let (a, a_tx, _a_rx) = member();
        let (b, b_tx, _b_rx) = member();
        let (c, c_tx, _c_rx) = member();

        let id = handle.create_room(a, a_tx).await.unwrap();
        handle.join_room(id.clone(), b, b_tx).await.unwrap();
        assert!(handle.join_room(id, c, c_tx).await.is_err());
    }

    #[tokio::test]
    async fn forward_reaches_only_the_other_member() {
        let handle = manager();
        let (a, a_tx, mut a_rx) = member();
        let (b, b_tx, mut b_rx) = member();

        let id = handle.create_room(a, a_tx).await.unwrap();
        handle.join_room(id, b, b_tx).await.unwrap();
        assert!(a_rx.recv().await.unwrap().as_str().starts_with("CREATED"));
        assert_eq!(a_rx.recv().await.unwrap().as_str(), "PEER CONNECTED");
        assert!(b_rx.recv().await.unwrap().as_str().starts_with("JOINED"));

        handle.forward(b, r#"{"sdp":{}}"#.to_string()).await;
        handle.forward(a, "back".to_string()).await;

        assert_eq!(a_rx.recv().await.unwrap().as_str(), r#"{"sdp":{}}"#);
        assert_eq!(b_rx.recv().await.unwrap().as_str(), "back");
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_room_is_removed() {
        let handle = manager();
        let (a, a_tx, _a_rx) = member();
        let (b, b_tx, _b_rx) = member();

        let id = handle.create_room(a, a_tx).await.unwrap();
        handle.leave_room(a).await;
        assert!(handle.join_room(id, b, b_tx).await.is_err());
    }

    #[tokio::test]
    async fn departed_member_frees_a_slot() {
        let handle = manager();
        let (a, a_tx, _a_rx) = member();
        let (b, b_tx, _b_rx) = member();
        let (c, c_tx, _c_rx) = member();

        let id = handle.create_room(a, a_tx).await.unwrap();
        handle.join_room(id.clone(), b, b_tx).await.unwrap();
        handle.leave_room(b).await;
        handle.join_room(id, c, c_tx).await.unwrap();
    }
}
