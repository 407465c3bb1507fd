//! UseCase: オーナーによるルームのクローズ

use std::sync::Arc;

use bleachers_shared::time::Clock;

use crate::{
    domain::{
        AdmissionController, AdmissionError, RoomFamily, RoomId, RoomRepository, TicketId,
        TicketRepository, Timestamp,
    },
    infrastructure::broadcaster::Broadcaster,
};

use super::error::CloseRoomError;

const CLOSED_BY_OWNER: &str = "room closed by its owner";

/// ルームクローズのユースケース
///
/// オーナーは入室申請で発行された自分のチケットで本人確認します。
/// 観戦ルームにはオーナーがいないので、期限切れ処理でのみ閉じられます。
pub struct CloseRoomUseCase {
    rooms: Arc<dyn RoomRepository>,
    tickets: Arc<dyn TicketRepository>,
    controller: Arc<AdmissionController>,
    broadcaster: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
}

impl CloseRoomUseCase {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        tickets: Arc<dyn TicketRepository>,
        controller: Arc<AdmissionController>,
        broadcaster: Arc<Broadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rooms,
            tickets,
            controller,
            broadcaster,
            clock,
        }
    }

    /// Returns `false` when the room was already closed.
    pub async fn execute(
        &self,
        room_id: &RoomId,
        ticket_id: &TicketId,
    ) -> Result<bool, CloseRoomError> {
        let now = Timestamp::new(self.clock.now_millis());
        let ticket = self
            .tickets
            .find(ticket_id)
            .await?
            .filter(|t| t.is_for(room_id) && t.expires_at >= now)
            .ok_or(CloseRoomError::InvalidTicket)?;
        let room = self
            .rooms
            .find(room_id)
            .await?
            .ok_or(AdmissionError::RoomNotFound)?;
        if room.family != RoomFamily::Match || !room.is_owned_by(&ticket.user_id) {
            return Err(AdmissionError::NotOwner.into());
        }

        let closed = self.controller.close(room_id, now).await?;
        if closed {
            self.broadcaster.publish_close(room_id, CLOSED_BY_OWNER).await;
        }
        Ok(closed)
    }
}
