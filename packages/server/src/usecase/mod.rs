//! UseCase layer
//!
//! アプリケーションのユースケースを定義します。
//! UI 層（HTTP / WebSocket / キューの購読）から呼ばれ、ドメインのルールと
//! インスタンス内のコンポーネント（Registry, Broadcaster, 監視）を組み合わせます。

mod close_room;
mod connect_participant;
mod disconnect_participant;
pub mod error;
mod expire_rooms;
mod get_room_detail;
mod open_watch_rooms;
mod request_admission;
mod send_message;

#[cfg(test)]
pub(crate) mod testing;

pub use close_room::CloseRoomUseCase;
pub use connect_participant::ConnectParticipantUseCase;
pub use disconnect_participant::{DisconnectParticipantUseCase, Disconnected};
pub use error::{
    CloseRoomError, ConnectError, GetRoomDetailError, RequestAdmissionError, SendMessageError,
};
pub use expire_rooms::{ExpireRoomsUseCase, ExpiryPolicy};
pub use get_room_detail::{GetRoomDetailUseCase, RoomDetail};
pub use open_watch_rooms::OpenWatchRoomsUseCase;
pub use request_admission::{
    Admission, AdmissionCommand, AdmissionSettings, RequestAdmissionUseCase,
};
pub use send_message::SendMessageUseCase;
