//! Connection Registry
//!
//! このインスタンスが受け付けた WebSocket 接続を、ルーム別・ユーザー別の
//! 二つの索引で保持します。
//!
//! ## 責務
//!
//! - セッションの登録と削除（両索引を一つのクリティカルセクションで更新）
//! - WATCH ルームの単一セッション制約（古いセッションへ close を送って切り離す）
//! - ルーム内のローカルセッションへのフレーム配送と、送信失敗セッションの除去
//!
//! ブローカーやストアには触れません。購読の管理は Broadcaster が行います。

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};

use crate::domain::{
    ChatSession, Outbound, PusherChannel, RoomId, SessionId, UserId,
    session::CLOSE_CODE_REPLACED,
};

/// How long a room seen closed keeps refusing sessions here. Later joins are
/// refused by the shared room state anyway.
pub const CLOSED_ROOM_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("server is shutting down")]
    ShuttingDown,
    #[error("room is closed")]
    RoomClosed,
}

/// Result of a successful accept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AcceptOutcome {
    /// Older sessions of the same user detached by the single-session rule.
    pub evicted: Vec<ChatSession>,
    /// Whether the user already had a session in the room before this one.
    pub already_present: bool,
    /// Whether the new session took over the seat of a replaced session in
    /// the same room.
    pub seat_reused: bool,
}

struct Connection {
    session: ChatSession,
    sender: PusherChannel,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<SessionId, Connection>,
    by_room: HashMap<RoomId, HashSet<SessionId>>,
    by_user: HashMap<UserId, HashSet<SessionId>>,
    /// Rooms seen closed, with when.
    closed_rooms: HashMap<RoomId, Instant>,
    /// Replaced sessions whose seat moved to their successor.
    seat_handovers: HashSet<SessionId>,
    shutting_down: bool,
}

impl Inner {
    fn forget_old_closures(&mut self) {
        self.closed_rooms
            .retain(|_, closed_at| closed_at.elapsed() < CLOSED_ROOM_RETENTION);
    }

    fn detach(&mut self, id: &SessionId) -> Option<Connection> {
        let connection = self.connections.remove(id)?;
        let room_id = &connection.session.room_id;
        if let Some(ids) = self.by_room.get_mut(room_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_room.remove(room_id);
            }
        }
        let user_id = &connection.session.user_id;
        if let Some(ids) = self.by_user.get_mut(user_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_user.remove(user_id);
            }
        }
        Some(connection)
    }

    fn sessions_of(&self, ids: Option<&HashSet<SessionId>>) -> Vec<ChatSession> {
        let mut sessions: Vec<ChatSession> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.connections.get(id))
            .map(|c| c.session.clone())
            .collect();
        sessions.sort_by_key(|s| (s.connected_at, s.id));
        sessions
    }

    fn user_in_room(&self, user_id: &UserId, room_id: &RoomId) -> bool {
        self.by_user.get(user_id).is_some_and(|ids| {
            ids.iter()
                .filter_map(|id| self.connections.get(id))
                .any(|c| &c.session.room_id == room_id)
        })
    }

    fn close_all(&mut self, ids: Vec<SessionId>, code: u16, reason: &str) -> Vec<ChatSession> {
        ids.into_iter()
            .filter_map(|id| self.detach(&id))
            .map(|connection| {
                let _ = connection.sender.send(Outbound::Close {
                    code,
                    reason: reason.to_string(),
                });
                connection.session
            })
            .collect()
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session together with the channel feeding its socket.
    ///
    /// For single-session families, every other session of the same user in
    /// a room of that family is sent a close frame and detached first.
    pub async fn accept(
        &self,
        session: ChatSession,
        sender: PusherChannel,
    ) -> Result<AcceptOutcome, RegistryError> {
        self.register(session, sender, false).await
    }

    /// Like [`accept`](Self::accept), for a reconnect that holds no seat of
    /// its own. The seat of the session it replaces in the same room is
    /// handed over; `seat_reused` is false when there was none left to take.
    pub async fn replace(
        &self,
        session: ChatSession,
        sender: PusherChannel,
    ) -> Result<AcceptOutcome, RegistryError> {
        self.register(session, sender, true).await
    }

    /// Whether the session's seat was handed over to its successor. Clears
    /// the mark.
    pub async fn take_seat_handover(&self, id: &SessionId) -> bool {
        let mut inner = self.inner.lock().await;
        inner.seat_handovers.remove(id)
    }

    async fn register(
        &self,
        session: ChatSession,
        sender: PusherChannel,
        reuse_seat: bool,
    ) -> Result<AcceptOutcome, RegistryError> {
        let mut inner = self.inner.lock().await;
        if inner.shutting_down {
            return Err(RegistryError::ShuttingDown);
        }
        inner.forget_old_closures();
        if inner.closed_rooms.contains_key(&session.room_id) {
            return Err(RegistryError::RoomClosed);
        }

        let already_present = inner.user_in_room(&session.user_id, &session.room_id);

        let mut evicted = Vec::new();
        let mut seat_reused = false;
        if session.family.is_single_session() {
            let stale: Vec<SessionId> = inner
                .by_user
                .get(&session.user_id)
                .into_iter()
                .flatten()
                .filter(|id| {
                    inner
                        .connections
                        .get(id)
                        .is_some_and(|c| c.session.family == session.family)
                })
                .copied()
                .collect();
            evicted = inner.close_all(stale, CLOSE_CODE_REPLACED, "replaced by a newer session");
            if reuse_seat
                && let Some(donor) = evicted.iter().find(|old| old.room_id == session.room_id)
            {
                inner.seat_handovers.insert(donor.id);
                seat_reused = true;
            }
            for old in &evicted {
                tracing::info!(
                    "Session {} of '{}' in '{}' replaced by {}",
                    old.id,
                    old.user_id,
                    old.room_id,
                    session.id
                );
            }
        }

        let id = session.id;
        inner
            .by_room
            .entry(session.room_id.clone())
            .or_default()
            .insert(id);
        inner
            .by_user
            .entry(session.user_id.clone())
            .or_default()
            .insert(id);
        inner
            .connections
            .insert(id, Connection { session, sender });

        Ok(AcceptOutcome {
            evicted,
            already_present,
            seat_reused,
        })
    }

    /// Detach a session. Unknown sessions are a no-op and return `None`.
    pub async fn remove(&self, id: &SessionId) -> Option<ChatSession> {
        let mut inner = self.inner.lock().await;
        inner.detach(id).map(|c| c.session)
    }

    pub async fn sessions_for_room(&self, room_id: &RoomId) -> Vec<ChatSession> {
        let inner = self.inner.lock().await;
        inner.sessions_of(inner.by_room.get(room_id))
    }

    pub async fn sessions_for_user(&self, user_id: &UserId) -> Vec<ChatSession> {
        let inner = self.inner.lock().await;
        inner.sessions_of(inner.by_user.get(user_id))
    }

    pub async fn has_sessions(&self, room_id: &RoomId) -> bool {
        let inner = self.inner.lock().await;
        inner.by_room.contains_key(room_id)
    }

    pub async fn user_in_room(&self, user_id: &UserId, room_id: &RoomId) -> bool {
        let inner = self.inner.lock().await;
        inner.user_in_room(user_id, room_id)
    }

    pub async fn connection_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.connections.len()
    }

    /// Send `text` to every session of the room except `skip`.
    ///
    /// Sessions whose channel is gone are detached on the spot. Returns how
    /// many were detached.
    pub async fn deliver(&self, room_id: &RoomId, text: &str, skip: Option<SessionId>) -> usize {
        let mut inner = self.inner.lock().await;
        let Some(ids) = inner.by_room.get(room_id) else {
            return 0;
        };

        let mut dead = Vec::new();
        for id in ids {
            if Some(*id) == skip {
                continue;
            }
            let Some(connection) = inner.connections.get(id) else {
                continue;
            };
            if connection
                .sender
                .send(Outbound::Text(text.to_string()))
                .is_err()
            {
                dead.push(*id);
            }
        }

        for id in &dead {
            if let Some(connection) = inner.detach(id) {
                tracing::warn!(
                    "Dropped session {} of '{}' after a failed send",
                    id,
                    connection.session.user_id
                );
            }
        }
        dead.len()
    }

    /// Send one frame to one session. Returns whether it was handed over.
    pub async fn push_to(&self, id: &SessionId, outbound: Outbound) -> bool {
        let inner = self.inner.lock().await;
        inner
            .connections
            .get(id)
            .is_some_and(|c| c.sender.send(outbound).is_ok())
    }

    /// Refuse further sessions for the room and close the local ones.
    pub async fn close_room(&self, room_id: &RoomId, code: u16, reason: &str) -> Vec<ChatSession> {
        let mut inner = self.inner.lock().await;
        inner.forget_old_closures();
        inner.closed_rooms.insert(room_id.clone(), Instant::now());
        let ids: Vec<SessionId> = inner
            .by_room
            .get(room_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        inner.close_all(ids, code, reason)
    }

    /// Refuse further sessions and close every local one.
    pub async fn shutdown(&self, code: u16, reason: &str) -> Vec<ChatSession> {
        let mut inner = self.inner.lock().await;
        inner.shutting_down = true;
        let ids: Vec<SessionId> = inner.connections.keys().copied().collect();
        inner.close_all(ids, code, reason)
    }
}
