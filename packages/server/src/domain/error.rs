//! Domain errors
//!
//! 各ポート（ストア・ブローカー・キュー）とドメインルールのエラーを定義します。
//! インフラ由来のエラーは境界で吸収され、検証エラーだけが呼び出し元まで届きます。

use thiserror::Error;

use super::value_object::RequestId;

/// Value object construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} has an invalid format: '{value}'")]
    InvalidFormat { field: &'static str, value: String },
    #[error("{0}")]
    OutOfRange(String),
}

/// Room lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomStateError {
    #[error("room is closed")]
    Closed,
}

/// Shared key-value store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("key '{0}' holds a value of another type")]
    WrongType(String),
}

/// Pub/sub broker errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("broker backend error: {0}")]
    Backend(String),
    #[error("broker connection is closed")]
    Closed,
}

/// Durable queue errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),
    #[error("queue is closed")]
    Closed,
}

/// Repository errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("stored record is corrupted: {0}")]
    Corrupted(String),
}

/// Authorization round-trip errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The request could not be handed to the authorization service.
    #[error("authorization unavailable: {0}")]
    Unavailable(String),
    /// No result arrived within the poll timeout.
    #[error("authorization unavailable: no result for request {0}")]
    Timeout(RequestId),
    /// The authorization service answered, and said no.
    #[error("authorization rejected: {0}")]
    Rejected(String),
}

/// Admission rejections. All of these are user-facing and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("room is closed")]
    RoomClosed,
    #[error("game not found")]
    GameNotFound,
    #[error("game has already finished")]
    GameFinished,
    #[error("game is not scheduled for today")]
    GameNotToday,
    #[error("team does not play in this game")]
    TeamNotInGame,
    #[error("caller team does not match the room team")]
    TeamMismatch,
    #[error("caller age does not satisfy the room condition")]
    AgeCondition,
    #[error("caller gender does not satisfy the room condition")]
    GenderCondition,
    #[error("caller win rate does not satisfy the room condition")]
    WinRateCondition,
    #[error("caller profile is missing '{0}' required by the room")]
    MissingCondition(&'static str),
    #[error("malformed room conditions: {0}")]
    MalformedConditions(String),
    #[error("only the room owner may do this")]
    NotOwner,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AdmissionError {
    /// Stable, client-facing error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomFull => "ROOM_FULL",
            Self::RoomClosed => "ROOM_CLOSED",
            Self::GameNotFound => "GAME_NOT_FOUND",
            Self::GameFinished => "GAME_FINISHED",
            Self::GameNotToday => "GAME_NOT_TODAY",
            Self::TeamNotInGame => "TEAM_NOT_IN_GAME",
            Self::TeamMismatch => "TEAM_MISMATCH",
            Self::AgeCondition => "AGE_CONDITION_NOT_MET",
            Self::GenderCondition => "GENDER_CONDITION_NOT_MET",
            Self::WinRateCondition => "WIN_RATE_CONDITION_NOT_MET",
            Self::MissingCondition(_) => "MISSING_CONDITION",
            Self::MalformedConditions(_) => "MALFORMED_CONDITIONS",
            Self::NotOwner => "NOT_ROOM_OWNER",
            Self::Repository(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<RoomStateError> for AdmissionError {
    fn from(err: RoomStateError) -> Self {
        match err {
            RoomStateError::Closed => Self::RoomClosed,
        }
    }
}

impl From<ValueObjectError> for AdmissionError {
    fn from(err: ValueObjectError) -> Self {
        Self::MalformedConditions(err.to_string())
    }
}
