//! UseCase: 期限切れルームの掃除
//!
//! 定期的に開いているルームを見て回り、次のルームを CLOSED にします。
//!
//! - 観戦ルーム：試合が終了・中止・見つからない、または試合日が過ぎた
//! - マッチルーム：参加者 0 人の状態が猶予時間以上続いた
//!
//! 複数インスタンスが同時に掃除しても、クローズを通知するのは
//! 状態を CLOSED に変えたインスタンスだけです。

use std::{sync::Arc, time::Duration};

use bleachers_shared::time::{Clock, local_date};
use chrono::FixedOffset;

use crate::{
    domain::{
        AdmissionController, GameRepository, RepositoryError, Room, RoomFamily, RoomId,
        RoomRepository, Timestamp,
    },
    infrastructure::broadcaster::Broadcaster,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// How long a match room may stay empty.
    pub empty_room_grace: Duration,
    /// Zone in which game days are counted.
    pub zone: FixedOffset,
}

/// 期限切れルーム掃除のユースケース
pub struct ExpireRoomsUseCase {
    rooms: Arc<dyn RoomRepository>,
    games: Arc<dyn GameRepository>,
    controller: Arc<AdmissionController>,
    broadcaster: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
    policy: ExpiryPolicy,
}

impl ExpireRoomsUseCase {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        games: Arc<dyn GameRepository>,
        controller: Arc<AdmissionController>,
        broadcaster: Arc<Broadcaster>,
        clock: Arc<dyn Clock>,
        policy: ExpiryPolicy,
    ) -> Self {
        Self {
            rooms,
            games,
            controller,
            broadcaster,
            clock,
            policy,
        }
    }

    /// One sweep. Returns the rooms this call closed.
    pub async fn execute(&self) -> Result<Vec<RoomId>, RepositoryError> {
        let now = Timestamp::new(self.clock.now_millis());
        let mut closed = Vec::new();
        for room_id in self.rooms.list_open().await? {
            let room = match self.rooms.find(&room_id).await {
                Ok(Some(room)) => room,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Skipping '{}' in this sweep: {}", room_id, e);
                    continue;
                }
            };
            let reason = match self.expiry_reason(&room, now).await {
                Ok(Some(reason)) => reason,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Skipping '{}' in this sweep: {}", room_id, e);
                    continue;
                }
            };
            match self.controller.close(&room_id, now).await {
                Ok(true) => {
                    tracing::info!("Expired '{}': {}", room_id, reason);
                    self.broadcaster.publish_close(&room_id, reason).await;
                    closed.push(room_id);
                }
                // 他のインスタンスが先に閉じた
                Ok(false) => {}
                Err(e) => tracing::warn!("Failed to expire '{}': {}", room_id, e),
            }
        }
        Ok(closed)
    }

    async fn expiry_reason(
        &self,
        room: &Room,
        now: Timestamp,
    ) -> Result<Option<&'static str>, RepositoryError> {
        match room.family {
            RoomFamily::Watch => {
                let Some(game_id) = room.game_id.as_ref() else {
                    return Ok(Some("watch room without a game"));
                };
                let Some(game) = self.games.find(game_id).await? else {
                    return Ok(Some("game not found"));
                };
                if game.status.is_over() {
                    return Ok(Some("game is over"));
                }
                let today = local_date(now.value(), self.policy.zone);
                if local_date(game.starts_at.value(), self.policy.zone) < today {
                    return Ok(Some("game day has passed"));
                }
                Ok(None)
            }
            RoomFamily::Match => {
                let grace = i64::try_from(self.policy.empty_room_grace.as_millis())
                    .unwrap_or(i64::MAX);
                let abandoned = room.current_participants == 0
                    && room
                        .empty_since
                        .is_some_and(|since| now.value() - since.value() >= grace);
                Ok(abandoned.then_some("room stayed empty"))
            }
        }
    }
}
