//! Authorization request/result pair exchanged with the user service.

use std::time::Duration;

use async_trait::async_trait;

use super::{
    entity::{Gender, RoomFamily},
    error::AuthError,
    value_object::{GameId, RequestId, TeamId, UserId},
};

/// What the caller wants to do with the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Create,
    Join,
}

impl AuthAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Join => "JOIN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "CREATE" => Some(Self::Create),
            "JOIN" => Some(Self::Join),
            _ => None,
        }
    }
}

/// Caller profile as returned by the authorization service.
///
/// Fields are optional because the profile may be incomplete. Whether a
/// missing field matters is decided by the room's conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub user_id: UserId,
    pub nickname: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub team_id: Option<TeamId>,
    pub win_rate: Option<f64>,
    pub profile_image_url: Option<String>,
    pub is_winning_fairy: bool,
}

/// Request sent to the authorization service. `request_id` is the correlation key.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    pub request_id: RequestId,
    pub token: String,
    pub chat_type: RoomFamily,
    pub action: AuthAction,
    pub game_id: Option<GameId>,
    /// Room conditions as supplied by the caller, passed through untouched.
    pub room_info: serde_json::Value,
}

/// Answer of the authorization service for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub request_id: RequestId,
    pub success: bool,
    pub user_info: Option<UserInfo>,
    pub error_message: Option<String>,
}

impl AuthResult {
    pub fn granted(request_id: RequestId, user_info: UserInfo) -> Self {
        Self {
            request_id,
            success: true,
            user_info: Some(user_info),
            error_message: None,
        }
    }

    pub fn denied(request_id: RequestId, message: impl Into<String>) -> Self {
        Self {
            request_id,
            success: false,
            user_info: None,
            error_message: Some(message.into()),
        }
    }

    /// The caller profile, or the rejection reason.
    pub fn into_user_info(self) -> Result<UserInfo, AuthError> {
        match (self.success, self.user_info) {
            (true, Some(info)) => Ok(info),
            (true, None) => Err(AuthError::Rejected(
                "authorization result carries no user info".to_string(),
            )),
            (false, _) => Err(AuthError::Rejected(
                self.error_message
                    .unwrap_or_else(|| "authorization denied".to_string()),
            )),
        }
    }
}

/// Request/response correlation with the authorization service.
///
/// `request_auth` only enqueues; the answer is fetched with `poll_result`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthCorrelation: Send + Sync {
    /// Send a request with a fresh correlation id and return that id.
    async fn request_auth(
        &self,
        token: String,
        chat_type: RoomFamily,
        action: AuthAction,
        game_id: Option<GameId>,
        room_info: serde_json::Value,
    ) -> Result<RequestId, AuthError>;

    /// Wait up to `timeout` for the result of `request_id`. A result is handed
    /// out at most once.
    async fn poll_result(
        &self,
        request_id: RequestId,
        timeout: Duration,
    ) -> Result<AuthResult, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserInfo {
        UserInfo {
            user_id: UserId::new("u1".to_string()).unwrap(),
            nickname: "fan".to_string(),
            age: Some(30),
            gender: None,
            team_id: None,
            win_rate: None,
            profile_image_url: None,
            is_winning_fairy: false,
        }
    }

    #[test]
    fn test_granted_result_yields_user_info() {
        // テスト項目: 成功した認可結果からユーザー情報が取り出せる
        let result = AuthResult::granted(RequestId::generate(), user());
        assert_eq!(result.into_user_info(), Ok(user()));
    }

    #[test]
    fn test_denied_result_carries_message() {
        // テスト項目: 失敗した認可結果はエラーメッセージ付きの Rejected になる
        let result = AuthResult::denied(RequestId::generate(), "token expired");
        assert_eq!(
            result.into_user_info(),
            Err(AuthError::Rejected("token expired".to_string()))
        );
    }

    #[test]
    fn test_success_without_user_info_is_rejected() {
        // テスト項目: success=true でもユーザー情報がなければ拒否扱い
        let result = AuthResult {
            request_id: RequestId::generate(),
            success: true,
            user_info: None,
            error_message: None,
        };
        assert!(matches!(
            result.into_user_info(),
            Err(AuthError::Rejected(_))
        ));
    }
}
