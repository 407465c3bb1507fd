//! Watch-room rules: today's game, the caller's own team only.

use std::sync::Arc;

use async_trait::async_trait;
use bleachers_shared::time::{Clock, local_date};
use chrono::FixedOffset;

use super::AdmissionStrategy;
use crate::domain::{
    auth::UserInfo,
    entity::{Room, RoomFamily},
    error::AdmissionError,
    repository::GameRepository,
};

pub struct WatchAdmission {
    games: Arc<dyn GameRepository>,
    clock: Arc<dyn Clock>,
    zone: FixedOffset,
}

impl WatchAdmission {
    /// `zone` is the server's configured timezone; "today" is evaluated in it.
    pub fn new(games: Arc<dyn GameRepository>, clock: Arc<dyn Clock>, zone: FixedOffset) -> Self {
        Self { games, clock, zone }
    }
}

#[async_trait]
impl AdmissionStrategy for WatchAdmission {
    fn family(&self) -> RoomFamily {
        RoomFamily::Watch
    }

    async fn validate(&self, caller: &UserInfo, room: &Room) -> Result<(), AdmissionError> {
        let game_id = room.game_id.as_ref().ok_or(AdmissionError::GameNotFound)?;
        let game = self
            .games
            .find(game_id)
            .await?
            .ok_or(AdmissionError::GameNotFound)?;

        if game.status.is_over() {
            return Err(AdmissionError::GameFinished);
        }

        let room_team = room.team_id.as_ref().ok_or_else(|| {
            AdmissionError::MalformedConditions("watch room has no team".to_string())
        })?;
        if !game.involves(room_team) {
            return Err(AdmissionError::TeamNotInGame);
        }

        let today = local_date(self.clock.now_millis(), self.zone);
        if local_date(game.starts_at.value(), self.zone) != today {
            return Err(AdmissionError::GameNotToday);
        }

        let caller_team = caller
            .team_id
            .as_ref()
            .ok_or(AdmissionError::MissingCondition("teamId"))?;
        if caller_team != room_team {
            return Err(AdmissionError::TeamMismatch);
        }

        Ok(())
    }
}
