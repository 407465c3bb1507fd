//! Request handlers.

mod http;
mod websocket;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{domain::AdmissionError, infrastructure::dto::http::ErrorResponse};

pub use http::{close_room, get_room_detail, health_check, request_admission};
pub use websocket::websocket_handler;

/// `{errorCode, message}` body with `status`.
fn error_response(status: StatusCode, error_code: &str, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error_code: error_code.to_string(),
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

fn admission_status(err: &AdmissionError) -> StatusCode {
    match err {
        AdmissionError::RoomNotFound | AdmissionError::GameNotFound => StatusCode::NOT_FOUND,
        AdmissionError::RoomFull | AdmissionError::RoomClosed => StatusCode::CONFLICT,
        AdmissionError::GameFinished
        | AdmissionError::GameNotToday
        | AdmissionError::TeamNotInGame
        | AdmissionError::TeamMismatch
        | AdmissionError::AgeCondition
        | AdmissionError::GenderCondition
        | AdmissionError::WinRateCondition
        | AdmissionError::MissingCondition(_)
        | AdmissionError::NotOwner => StatusCode::FORBIDDEN,
        AdmissionError::MalformedConditions(_) => StatusCode::BAD_REQUEST,
        AdmissionError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn admission_error_response(err: &AdmissionError) -> Response {
    if let AdmissionError::Repository(e) = err {
        tracing::error!("Repository failure: {}", e);
    }
    error_response(admission_status(err), err.code(), err.to_string())
}
