//! Server state shared by every handler.

use std::sync::Arc;

use crate::{
    infrastructure::registry::ConnectionRegistry,
    usecase::{
        CloseRoomUseCase, ConnectParticipantUseCase, DisconnectParticipantUseCase,
        GetRoomDetailUseCase, RequestAdmissionUseCase, SendMessageUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// RequestAdmissionUseCase（入室申請のユースケース）
    pub request_admission_usecase: Arc<RequestAdmissionUseCase>,
    /// ConnectParticipantUseCase（参加者接続のユースケース）
    pub connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    /// DisconnectParticipantUseCase（参加者切断のユースケース）
    pub disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    /// SendMessageUseCase（メッセージ送信のユースケース）
    pub send_message_usecase: Arc<SendMessageUseCase>,
    /// CloseRoomUseCase（ルームクローズのユースケース）
    pub close_room_usecase: Arc<CloseRoomUseCase>,
    /// GetRoomDetailUseCase（ルーム詳細取得のユースケース）
    pub get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
    /// このインスタンスの接続（ヘルスチェック用）
    pub registry: Arc<ConnectionRegistry>,
    pub instance_id: String,
}
