//! GameRepository on the shared key-value store (`chat:game:{id}`, JSON).

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    domain::{Game, GameId, GameRepository, KeyValueStore, RepositoryError},
    infrastructure::dto::queue::GameScheduleMessage,
};

const GAME_KEY_PREFIX: &str = "chat:game:";

fn game_key(id: &GameId) -> String {
    format!("{GAME_KEY_PREFIX}{}", id.as_str())
}

pub struct KvGameRepository {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl KvGameRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }
}

#[async_trait]
impl GameRepository for KvGameRepository {
    async fn find(&self, id: &GameId) -> Result<Option<Game>, RepositoryError> {
        let Some(json) = self.store.get(&game_key(id)).await? else {
            return Ok(None);
        };
        let dto: GameScheduleMessage = serde_json::from_str(&json)
            .map_err(|e| RepositoryError::Corrupted(format!("game '{id}': {e}")))?;
        Game::try_from(dto)
            .map(Some)
            .map_err(|e| RepositoryError::Corrupted(format!("game '{id}': {e}")))
    }

    async fn save(&self, game: &Game) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(&GameScheduleMessage::from(game))
            .map_err(|e| RepositoryError::Corrupted(e.to_string()))?;
        self.store
            .set(&game_key(&game.id), &json, Some(self.ttl))
            .await?;
        Ok(())
    }
}
