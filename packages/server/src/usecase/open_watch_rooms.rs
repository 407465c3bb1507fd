//! UseCase: 試合スケジュールの反映と観戦ルームの開設
//!
//! 上流のクローラーから届いた試合を保存し、両チームの観戦ルームを開きます。
//! 同じ試合が何度届いても結果は同じです（ルーム ID が決定的なため）。

use std::sync::Arc;

use bleachers_shared::time::Clock;

use crate::domain::{AdmissionController, AdmissionError, Game, GameRepository, Room, RoomId, Timestamp};

pub struct OpenWatchRoomsUseCase {
    games: Arc<dyn GameRepository>,
    controller: Arc<AdmissionController>,
    clock: Arc<dyn Clock>,
    watch_capacity: u32,
}

impl OpenWatchRoomsUseCase {
    pub fn new(
        games: Arc<dyn GameRepository>,
        controller: Arc<AdmissionController>,
        clock: Arc<dyn Clock>,
        watch_capacity: u32,
    ) -> Self {
        Self {
            games,
            controller,
            clock,
            watch_capacity,
        }
    }

    /// Save `game` and open its watch rooms. Returns the rooms opened by this
    /// call. Finished or canceled games only update the stored game.
    pub async fn execute(&self, game: Game) -> Result<Vec<RoomId>, AdmissionError> {
        self.games.save(&game).await?;
        if game.status.is_over() {
            tracing::info!("Game '{}' is {}", game.id, game.status.as_str());
            return Ok(Vec::new());
        }

        let now = Timestamp::new(self.clock.now_millis());
        let mut opened = Vec::new();
        for team_id in game.teams() {
            let room = Room::new_watch(&game, team_id.clone(), self.watch_capacity, now)?;
            if self.controller.open(&room).await? {
                tracing::info!("Opened watch room '{}'", room.id);
                opened.push(room.id);
            }
        }
        Ok(opened)
    }
}
