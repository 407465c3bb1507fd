//! HTTP API request/response DTOs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub token: String,
    pub chat_type: String,
    pub action: String,
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(default)]
    pub room_info: serde_json::Value,
}

/// Where and how to connect after a successful admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionDescriptor {
    pub room_id: String,
    pub chat_type: String,
    pub ticket: String,
    pub expires_at: i64,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConditions {
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub gender: String,
    pub allow_other_teams: bool,
    pub min_win_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetail {
    pub room_id: String,
    pub chat_type: String,
    pub status: String,
    pub title: Option<String>,
    pub game_id: Option<String>,
    pub team_id: Option<String>,
    pub owner_id: Option<String>,
    pub max_participants: u32,
    pub current_participants: u32,
    pub conditions: Option<RoomConditions>,
    pub created_at: i64,
    /// Sessions of this room held by the answering instance.
    pub local_sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseRoomRequest {
    pub ticket: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseRoomResponse {
    pub room_id: String,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub instance_id: String,
    pub connections: usize,
}
