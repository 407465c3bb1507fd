//! Live chat sessions, admission tickets and the events exchanged inside a room.

use tokio::sync::mpsc;

use super::{
    entity::RoomFamily,
    value_object::{
        DisplayName, MessageContent, RoomId, SessionId, TicketId, Timestamp, UserId,
    },
};

/// WebSocket close code sent to a session replaced by a newer one.
pub const CLOSE_CODE_REPLACED: u16 = 4000;
/// WebSocket close code sent when the room is closed.
pub const CLOSE_CODE_ROOM_CLOSED: u16 = 4001;
/// WebSocket close code sent when the server shuts down.
pub const CLOSE_CODE_GOING_AWAY: u16 = 1001;

/// Item pushed to a connection's outbound task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized event frame.
    Text(String),
    /// Graceful close; the outbound task sends a close frame and stops.
    Close { code: u16, reason: String },
}

/// Channel feeding one connection's outbound task.
pub type PusherChannel = mpsc::UnboundedSender<Outbound>;

/// One live connection, owned by the registry of the instance that accepted it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub display_name: DisplayName,
    pub room_id: RoomId,
    pub family: RoomFamily,
    pub profile_image_url: Option<String>,
    pub is_winning_fairy: bool,
    pub connected_at: Timestamp,
}

/// Credential issued by a successful admission. Reusable until it expires so
/// that a client can reconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionTicket {
    pub id: TicketId,
    pub user_id: UserId,
    pub display_name: DisplayName,
    pub room_id: RoomId,
    pub family: RoomFamily,
    pub profile_image_url: Option<String>,
    pub is_winning_fairy: bool,
    pub expires_at: Timestamp,
}

impl AdmissionTicket {
    pub fn is_for(&self, room_id: &RoomId) -> bool {
        &self.room_id == room_id
    }

    /// Open a new session from this ticket.
    pub fn open_session(&self, now: Timestamp) -> ChatSession {
        ChatSession {
            id: SessionId::generate(),
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            room_id: self.room_id.clone(),
            family: self.family,
            profile_image_url: self.profile_image_url.clone(),
            is_winning_fairy: self.is_winning_fairy,
            connected_at: now,
        }
    }
}

/// Something that happened in a room and is fanned out to its sessions.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Message {
        session: ChatSession,
        content: MessageContent,
        sent_at: Timestamp,
    },
    UserJoin {
        session: ChatSession,
        at: Timestamp,
    },
    UserLeave {
        session: ChatSession,
        at: Timestamp,
    },
}

impl ChatEvent {
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::Message { session, .. }
            | Self::UserJoin { session, .. }
            | Self::UserLeave { session, .. } => &session.room_id,
        }
    }
}
