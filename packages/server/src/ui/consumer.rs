//! Background inbound adapters: queue consumers and periodic jobs.

use std::{sync::Arc, time::Duration};

use crate::{
    domain::{Game, QueueSubscription},
    infrastructure::dto::queue::GameScheduleMessage,
    usecase::{ExpireRoomsUseCase, OpenWatchRoomsUseCase},
};

/// Parse one `game-schedule` payload.
pub fn parse_game(payload: &str) -> Result<Game, String> {
    let message: GameScheduleMessage =
        serde_json::from_str(payload).map_err(|e| e.to_string())?;
    Game::try_from(message).map_err(|e| e.to_string())
}

/// Apply every `game-schedule` record until the queue closes.
pub async fn consume_game_schedule(
    usecase: Arc<OpenWatchRoomsUseCase>,
    mut subscription: Box<dyn QueueSubscription>,
) {
    while let Some(record) = subscription.next().await {
        let game = match parse_game(&record.payload) {
            Ok(game) => game,
            Err(e) => {
                tracing::warn!("Dropping malformed game schedule '{}': {}", record.key, e);
                continue;
            }
        };
        let game_id = game.id.clone();
        match usecase.execute(game).await {
            Ok(opened) => {
                tracing::debug!("Game '{}' applied, {} room(s) opened", game_id, opened.len());
            }
            Err(e) => tracing::error!("Failed to apply game '{}': {}", game_id, e),
        }
    }
    tracing::info!("Game schedule consumer stopped");
}

/// Sweep expired rooms every `interval` until the task is aborted.
pub async fn sweep_rooms(usecase: Arc<ExpireRoomsUseCase>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match usecase.execute().await {
            Ok(closed) if !closed.is_empty() => {
                tracing::info!("Sweep closed {} room(s)", closed.len());
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Room sweep failed: {}", e),
        }
    }
}
