//! Conversion logic between DTOs and domain entities.

use thiserror::Error;

use crate::domain::{
    AdmissionError, AuthAction, AuthRequest, AuthResult, ChatEvent, Game, GameId, GameStatus,
    Gender, RequestId, Room, RoomFamily, TeamId, Timestamp, UserId, UserInfo, ValueObjectError,
};
use crate::infrastructure::dto::{http, queue, websocket as ws};

/// A DTO that does not describe a valid domain value.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid '{field}': {reason}")]
pub struct DtoError {
    pub field: &'static str,
    pub reason: String,
}

impl DtoError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

fn field<T>(name: &'static str, result: Result<T, ValueObjectError>) -> Result<T, DtoError> {
    result.map_err(|e| DtoError::new(name, e.to_string()))
}

/// Wire name of a room family (`WATCH` / `MATCH`).
pub fn chat_type(family: RoomFamily) -> String {
    family.as_str().to_ascii_uppercase()
}

pub fn parse_chat_type(value: &str) -> Result<RoomFamily, DtoError> {
    RoomFamily::parse(value).ok_or_else(|| DtoError::new("chatType", value))
}

pub fn parse_action(value: &str) -> Result<AuthAction, DtoError> {
    AuthAction::parse(value).ok_or_else(|| DtoError::new("action", value))
}

// ========================================
// Queue DTO ⇄ Domain
// ========================================

impl From<&AuthRequest> for queue::AuthRequestMessage {
    fn from(model: &AuthRequest) -> Self {
        Self {
            request_id: model.request_id.to_string(),
            token: model.token.clone(),
            chat_type: chat_type(model.chat_type),
            action: model.action.as_str().to_string(),
            game_id: model.game_id.as_ref().map(|id| id.as_str().to_string()),
            room_info: model.room_info.clone(),
        }
    }
}

impl TryFrom<queue::AuthRequestMessage> for AuthRequest {
    type Error = DtoError;

    fn try_from(dto: queue::AuthRequestMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            request_id: field("requestId", RequestId::parse(&dto.request_id))?,
            token: dto.token,
            chat_type: parse_chat_type(&dto.chat_type)?,
            action: parse_action(&dto.action)?,
            game_id: dto
                .game_id
                .map(|id| field("gameId", GameId::new(id)))
                .transpose()?,
            room_info: dto.room_info,
        })
    }
}

impl From<&UserInfo> for queue::UserInfoMessage {
    fn from(model: &UserInfo) -> Self {
        Self {
            user_id: model.user_id.as_str().to_string(),
            nickname: model.nickname.clone(),
            age: model.age,
            gender: model.gender.map(|g| g.as_str().to_string()),
            team_id: model.team_id.as_ref().map(|id| id.as_str().to_string()),
            win_rate: model.win_rate,
            profile_image_url: model.profile_image_url.clone(),
            is_winning_fairy: model.is_winning_fairy,
        }
    }
}

impl TryFrom<queue::UserInfoMessage> for UserInfo {
    type Error = DtoError;

    fn try_from(dto: queue::UserInfoMessage) -> Result<Self, Self::Error> {
        let gender = match dto.gender.as_deref() {
            None | Some("") => None,
            Some(value) => {
                Some(Gender::parse(value).ok_or_else(|| DtoError::new("gender", value))?)
            }
        };
        Ok(Self {
            user_id: field("userId", UserId::new(dto.user_id))?,
            nickname: dto.nickname,
            age: dto.age,
            gender,
            team_id: dto
                .team_id
                .map(|id| field("teamId", TeamId::new(id)))
                .transpose()?,
            win_rate: dto.win_rate,
            profile_image_url: dto.profile_image_url,
            is_winning_fairy: dto.is_winning_fairy,
        })
    }
}

impl From<&AuthResult> for queue::AuthResultMessage {
    fn from(model: &AuthResult) -> Self {
        Self {
            request_id: model.request_id.to_string(),
            success: model.success,
            user_info: model.user_info.as_ref().map(Into::into),
            error_message: model.error_message.clone(),
        }
    }
}

impl TryFrom<queue::AuthResultMessage> for AuthResult {
    type Error = DtoError;

    fn try_from(dto: queue::AuthResultMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            request_id: field("requestId", RequestId::parse(&dto.request_id))?,
            success: dto.success,
            user_info: dto.user_info.map(UserInfo::try_from).transpose()?,
            error_message: dto.error_message,
        })
    }
}

impl TryFrom<queue::GameScheduleMessage> for Game {
    type Error = DtoError;

    fn try_from(dto: queue::GameScheduleMessage) -> Result<Self, Self::Error> {
        let status =
            GameStatus::parse(&dto.status).ok_or_else(|| DtoError::new("status", &dto.status))?;
        Ok(Self {
            id: field("gameId", GameId::new(dto.game_id))?,
            home_team_id: field("homeTeamId", TeamId::new(dto.home_team_id))?,
            away_team_id: field("awayTeamId", TeamId::new(dto.away_team_id))?,
            starts_at: Timestamp::new(dto.starts_at),
            status,
        })
    }
}

impl From<&Game> for queue::GameScheduleMessage {
    fn from(model: &Game) -> Self {
        Self {
            game_id: model.id.as_str().to_string(),
            home_team_id: model.home_team_id.as_str().to_string(),
            away_team_id: model.away_team_id.as_str().to_string(),
            starts_at: model.starts_at.value(),
            status: model.status.as_str().to_string(),
        }
    }
}

// ========================================
// Domain → WebSocket DTO
// ========================================

impl From<&ChatEvent> for ws::ServerEvent {
    fn from(event: &ChatEvent) -> Self {
        match event {
            ChatEvent::Message {
                session,
                content,
                sent_at,
            } => Self::Message(ws::ChatMessageFrame {
                room_id: session.room_id.as_str().to_string(),
                user_id: session.user_id.as_str().to_string(),
                display_name: session.display_name.as_str().to_string(),
                content: content.as_str().to_string(),
                profile_image_url: session.profile_image_url.clone(),
                is_winning_fairy: session.is_winning_fairy,
                timestamp: sent_at.value(),
            }),
            ChatEvent::UserJoin { session, at } => Self::UserJoin(ws::PresenceFrame {
                room_id: session.room_id.as_str().to_string(),
                user_id: session.user_id.as_str().to_string(),
                display_name: session.display_name.as_str().to_string(),
                timestamp: at.value(),
            }),
            ChatEvent::UserLeave { session, at } => Self::UserLeave(ws::PresenceFrame {
                room_id: session.room_id.as_str().to_string(),
                user_id: session.user_id.as_str().to_string(),
                display_name: session.display_name.as_str().to_string(),
                timestamp: at.value(),
            }),
        }
    }
}

impl ws::ServerEvent {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error(ws::ErrorFrame {
            code: code.to_string(),
            message: message.into(),
        })
    }
}

// ========================================
// Domain → HTTP DTO
// ========================================

impl From<&AdmissionError> for http::ErrorResponse {
    fn from(err: &AdmissionError) -> Self {
        Self {
            error_code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl http::RoomDetail {
    pub fn from_room(room: Room, local_sessions: usize) -> Self {
        Self {
            room_id: room.id.into_string(),
            chat_type: chat_type(room.family),
            status: room.status.as_str().to_string(),
            title: room.title,
            game_id: room.game_id.map(GameId::into_string),
            team_id: room.team_id.map(TeamId::into_string),
            owner_id: room.owner_id.map(UserId::into_string),
            max_participants: room.max_participants,
            current_participants: room.current_participants,
            conditions: room.conditions.map(|c| http::RoomConditions {
                min_age: c.min_age,
                max_age: c.max_age,
                gender: c.gender.as_str().to_string(),
                allow_other_teams: c.allow_other_teams,
                min_win_rate: c.min_win_rate,
            }),
            created_at: room.created_at.value(),
            local_sessions,
        }
    }
}
