//! Repository traits
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//! ルーム・試合・チケットはすべてクラスタ共有のキーバリューストアに置かれます。

use std::time::Duration;

use async_trait::async_trait;

use super::{
    entity::{Game, Room, SeatChange},
    error::RepositoryError,
    session::AdmissionTicket,
    value_object::{GameId, RoomId, TicketId, Timestamp},
};

/// Result of trying to take a seat in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatOutcome {
    Taken(SeatChange),
    Full,
    Closed,
    NotFound,
}

/// Room Repository trait
///
/// UseCase 層はこの trait に依存し、Infrastructure 層の具体的な実装には依存しない。
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Store a new room. Returns `false` when a room with the same id exists.
    async fn insert(&self, room: &Room) -> Result<bool, RepositoryError>;

    async fn find(&self, id: &RoomId) -> Result<Option<Room>, RepositoryError>;

    /// Take one seat. Never lets the participant count exceed the capacity.
    async fn occupy_seat(&self, id: &RoomId, now: Timestamp)
    -> Result<SeatOutcome, RepositoryError>;

    /// Give one seat back. Never lets the participant count drop below zero.
    /// `None` when the room no longer exists or is already empty.
    async fn release_seat(
        &self,
        id: &RoomId,
        now: Timestamp,
    ) -> Result<Option<SeatChange>, RepositoryError>;

    /// Mark the room closed. Returns `false` when it was missing or already closed.
    async fn mark_closed(&self, id: &RoomId, now: Timestamp) -> Result<bool, RepositoryError>;

    /// Ids of every room that is not closed.
    async fn list_open(&self) -> Result<Vec<RoomId>, RepositoryError>;
}

/// Game Repository trait. Games are written by the upstream schedule feed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn find(&self, id: &GameId) -> Result<Option<Game>, RepositoryError>;

    async fn save(&self, game: &Game) -> Result<(), RepositoryError>;
}

/// Admission ticket storage.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn save(&self, ticket: &AdmissionTicket, ttl: Duration) -> Result<(), RepositoryError>;

    async fn find(&self, id: &TicketId) -> Result<Option<AdmissionTicket>, RepositoryError>;
}
