//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::{admission_error_response, error_response};
use crate::{
    domain::{AuthError, GameId, RoomId, TicketId},
    infrastructure::dto::{
        conversion::{chat_type, parse_action, parse_chat_type},
        http::{
            AdmissionDescriptor, AdmissionRequest, CloseRoomRequest, CloseRoomResponse,
            HealthResponse, RoomDetail,
        },
    },
    ui::state::AppState,
    usecase::{AdmissionCommand, CloseRoomError, GetRoomDetailError, RequestAdmissionError},
};

const INVALID_REQUEST: &str = "INVALID_REQUEST";
const INVALID_TICKET: &str = "INVALID_TICKET";

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        instance_id: state.instance_id.clone(),
        connections: state.registry.connection_count().await,
    })
}

/// Admission call: authorize the caller, then issue a ticket for the room.
pub async fn request_admission(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AdmissionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, INVALID_REQUEST, rejection.body_text());
        }
    };

    // DTO から Command への変換
    let command = match to_command(request) {
        Ok(command) => command,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, INVALID_REQUEST, message),
    };

    match state.request_admission_usecase.execute(command).await {
        Ok(admission) => {
            let room_id = admission.room.id.as_str();
            let ticket = admission.ticket.id.as_str();
            let descriptor = AdmissionDescriptor {
                room_id: room_id.to_string(),
                chat_type: chat_type(admission.room.family),
                ticket: ticket.to_string(),
                expires_at: admission.ticket.expires_at.value(),
                endpoint: format!("/ws/chat/{room_id}?ticket={ticket}"),
            };
            (StatusCode::OK, Json(descriptor)).into_response()
        }
        Err(e) => {
            tracing::info!("Admission refused: {}", e);
            admission_failure(&e)
        }
    }
}

fn to_command(request: AdmissionRequest) -> Result<AdmissionCommand, String> {
    let chat_type = parse_chat_type(&request.chat_type).map_err(|e| e.to_string())?;
    let action = parse_action(&request.action).map_err(|e| e.to_string())?;
    let game_id = request
        .game_id
        .filter(|id| !id.is_empty())
        .map(GameId::new)
        .transpose()
        .map_err(|e| e.to_string())?;
    Ok(AdmissionCommand {
        token: request.token,
        chat_type,
        action,
        game_id,
        room_info: request.room_info,
    })
}

fn admission_failure(err: &RequestAdmissionError) -> Response {
    match err {
        RequestAdmissionError::Admission(e) => admission_error_response(e),
        RequestAdmissionError::InvalidRequest(_) => {
            error_response(StatusCode::BAD_REQUEST, err.code(), err.to_string())
        }
        RequestAdmissionError::Auth(AuthError::Rejected(_)) => {
            error_response(StatusCode::UNAUTHORIZED, err.code(), err.to_string())
        }
        RequestAdmissionError::Auth(AuthError::Timeout(_) | AuthError::Unavailable(_)) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, err.code(), err.to_string())
        }
    }
}

/// Get room detail by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Response {
    let Ok(room_id) = RoomId::new(room_id) else {
        return error_response(StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", "room not found");
    };
    match state.get_room_detail_usecase.execute(&room_id).await {
        // Domain Model から DTO への変換
        Ok(detail) => {
            Json(RoomDetail::from_room(detail.room, detail.local_sessions)).into_response()
        }
        Err(GetRoomDetailError::RoomNotFound) => {
            error_response(StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", "room not found")
        }
        Err(GetRoomDetailError::Repository(e)) => {
            tracing::error!("Failed to load room '{}': {}", room_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string())
        }
    }
}

/// Close a match room. Only its owner may do this.
pub async fn close_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    body: Result<Json<CloseRoomRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, INVALID_REQUEST, rejection.body_text());
        }
    };
    let Ok(room_id) = RoomId::new(room_id) else {
        return error_response(StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", "room not found");
    };
    let Ok(ticket) = TicketId::new(request.ticket) else {
        return error_response(StatusCode::UNAUTHORIZED, INVALID_TICKET, "ticket is malformed");
    };

    match state.close_room_usecase.execute(&room_id, &ticket).await {
        Ok(closed) => Json(CloseRoomResponse {
            room_id: room_id.into_string(),
            closed,
        })
        .into_response(),
        Err(e @ CloseRoomError::InvalidTicket) => {
            error_response(StatusCode::UNAUTHORIZED, INVALID_TICKET, e.to_string())
        }
        Err(CloseRoomError::Admission(e)) => admission_error_response(&e),
    }
}
