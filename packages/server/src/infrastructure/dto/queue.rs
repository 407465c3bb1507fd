//! Message queue payload DTOs, shared with the user and notification services.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequestMessage {
    pub request_id: String,
    pub token: String,
    /// `WATCH` or `MATCH`
    pub chat_type: String,
    /// `CREATE` or `JOIN`
    pub action: String,
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(default)]
    pub room_info: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResultMessage {
    pub request_id: String,
    pub success: bool,
    #[serde(default)]
    pub user_info: Option<UserInfoMessage>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoMessage {
    pub user_id: String,
    pub nickname: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub win_rate: Option<f64>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub is_winning_fairy: bool,
}

/// Upstream game schedule update (`game-schedule` topic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameScheduleMessage {
    pub game_id: String,
    pub home_team_id: String,
    pub away_team_id: String,
    /// Epoch millis
    pub starts_at: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSpikeAlertMessage {
    pub room_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    pub message_count: i64,
    pub threshold: i64,
    pub timestamp: i64,
}
