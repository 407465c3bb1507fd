//! Domain layer
//!
//! エンティティ・値オブジェクト・入室ルール、そして外部協調者（共有ストア、
//! Pub/Sub ブローカー、メッセージキュー）へのポートを定義します。

pub mod admission;
pub mod auth;
pub mod broker;
pub mod entity;
pub mod error;
pub mod queue;
pub mod repository;
pub mod session;
pub mod store;
pub mod value_object;

pub use admission::{AdmissionController, AdmissionStrategy, MatchAdmission, WatchAdmission};
pub use auth::{AuthAction, AuthCorrelation, AuthRequest, AuthResult, UserInfo};
pub use broker::{BrokerInbox, BrokerMessage, MessageBroker, room_channel, room_from_channel};
pub use entity::{
    Game, GameStatus, Gender, GenderCondition, MatchConditions, Room, RoomFamily, RoomStatus,
    RoomTransition, SeatChange,
};
pub use error::{
    AdmissionError, AuthError, BrokerError, QueueError, RepositoryError, RoomStateError,
    StoreError, ValueObjectError,
};
pub use queue::{MessageQueue, QueueRecord, QueueSubscription};
pub use repository::{GameRepository, RoomRepository, SeatOutcome, TicketRepository};
pub use session::{AdmissionTicket, ChatEvent, ChatSession, Outbound, PusherChannel};
pub use store::KeyValueStore;
pub use value_object::{
    DisplayName, GameId, MAX_MESSAGE_CHARS, MessageContent, RequestId, RoomId, SessionId,
    TeamId, TicketId, Timestamp, UserId,
};
