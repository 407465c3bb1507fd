//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Path, Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{admission_error_response, error_response};
use crate::{
    domain::{ChatSession, Outbound, PusherChannel, RoomId, TicketId},
    infrastructure::{
        dto::websocket::{InboundFrame, ServerEvent},
        registry::RegistryError,
    },
    ui::state::AppState,
    usecase::ConnectError,
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub ticket: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Response {
    // String -> Domain Model
    let (Ok(room_id), Ok(ticket_id)) = (RoomId::new(room_id), TicketId::new(query.ticket)) else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "INVALID_TICKET",
            "room id or ticket is malformed",
        );
    };

    // Create a channel for this connection to receive frames
    let (tx, rx) = mpsc::unbounded_channel();

    // 座席の確保と Registry への登録はアップグレード前に済ませる
    let session = match state
        .connect_participant_usecase
        .execute(&room_id, &ticket_id, tx.clone())
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Rejected connection to '{}': {}", room_id, e);
            return connect_error_response(&e);
        }
    };
    tracing::info!(
        "User '{}' connected to '{}' (session {})",
        session.user_id,
        room_id,
        session.id
    );

    let failed_state = state.clone();
    let failed_session = session.clone();
    ws.on_failed_upgrade(move |e| {
        tracing::warn!("WebSocket upgrade failed for '{}': {}", failed_session.id, e);
        tokio::spawn(async move {
            failed_state
                .disconnect_participant_usecase
                .execute(&failed_session)
                .await;
        });
    })
    .on_upgrade(move |socket| handle_socket(socket, state, session, tx, rx))
    .into_response()
}

fn connect_error_response(err: &ConnectError) -> Response {
    match err {
        ConnectError::InvalidTicket => {
            error_response(StatusCode::UNAUTHORIZED, "INVALID_TICKET", err.to_string())
        }
        ConnectError::Admission(e) => admission_error_response(e),
        ConnectError::Registry(RegistryError::ShuttingDown) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "SHUTTING_DOWN", err.to_string())
        }
        ConnectError::Registry(RegistryError::RoomClosed) => {
            error_response(StatusCode::CONFLICT, "ROOM_CLOSED", err.to_string())
        }
    }
}

/// Spawns a task that forwards frames from the rx channel to the WebSocket sender.
///
/// A close request is sent as a close frame carrying its code and ends the task.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Text(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    })
}

/// Push an `error` frame to this connection only.
fn push_error(tx: &PusherChannel, code: &str, message: String) {
    match serde_json::to_string(&ServerEvent::error(code, message)) {
        Ok(json) => {
            let _ = tx.send(Outbound::Text(json));
        }
        Err(e) => tracing::error!("Failed to serialize error frame: {}", e),
    }
}

async fn on_text(state: &AppState, session: &ChatSession, tx: &PusherChannel, text: &str) {
    let frame = match serde_json::from_str::<InboundFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!("Unreadable frame from '{}': {}", session.id, e);
            push_error(tx, "INVALID_FRAME", "frame is not valid JSON".to_string());
            return;
        }
    };
    // ping などのコントロールフレームは無視
    let Some(content) = frame.chat_content() else {
        return;
    };
    if let Err(e) = state.send_message_usecase.execute(session, content).await {
        tracing::debug!("Rejected message from '{}': {}", session.id, e);
        push_error(tx, "INVALID_MESSAGE", e.to_string());
    }
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    session: ChatSession,
    tx: PusherChannel,
    rx: mpsc::UnboundedReceiver<Outbound>,
) {
    let (sender, mut receiver) = socket.split();

    let recv_state = state.clone();
    let recv_session = session.clone();

    // Spawn a task to receive frames from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!("WebSocket error on '{}': {}", recv_session.id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    on_text(&recv_state, &recv_session, &tx, text.as_str()).await;
                }
                Message::Close(_) => {
                    tracing::info!("Session '{}' requested close", recv_session.id);
                    break;
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                _ => {}
            }
        }
    });

    // Spawn a task to push room events to this client
    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    let outcome = state.disconnect_participant_usecase.execute(&session).await;
    tracing::info!(
        "Session '{}' of '{}' closed (left room: {})",
        session.id,
        session.user_id,
        outcome.left_room
    );
}
