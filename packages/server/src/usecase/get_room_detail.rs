//! UseCase: ルーム詳細取得

use std::sync::Arc;

use crate::{
    domain::{Room, RoomId, RoomRepository},
    infrastructure::registry::ConnectionRegistry,
};

use super::error::GetRoomDetailError;

/// Cluster-shared room metadata plus what this instance holds of it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomDetail {
    pub room: Room,
    pub local_sessions: usize,
}

pub struct GetRoomDetailUseCase {
    rooms: Arc<dyn RoomRepository>,
    registry: Arc<ConnectionRegistry>,
}

impl GetRoomDetailUseCase {
    pub fn new(rooms: Arc<dyn RoomRepository>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { rooms, registry }
    }

    pub async fn execute(&self, room_id: &RoomId) -> Result<RoomDetail, GetRoomDetailError> {
        let room = self
            .rooms
            .find(room_id)
            .await?
            .ok_or(GetRoomDetailError::RoomNotFound)?;
        let local_sessions = self.registry.sessions_for_room(room_id).await.len();
        Ok(RoomDetail {
            room,
            local_sessions,
        })
    }
}
