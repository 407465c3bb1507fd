//! Traffic Spike Detector
//!
//! ルームごとのメッセージ数を 1 分単位のバケット（`chat:traffic:{roomId}:{minute}`）で
//! 共有ストアに数え、直近 `window` 分の合計がしきい値に達したら
//! `traffic-spike-alert` トピックへ通知します。通知はクールダウン中は 1 回だけです。

use std::{sync::Arc, time::Duration};

use bleachers_shared::time::{Clock, minute_bucket};

use crate::{
    domain::{
        KeyValueStore, MessageQueue, RoomId, RoomRepository, StoreError,
        queue::TOPIC_TRAFFIC_SPIKE_ALERT,
    },
    infrastructure::dto::queue::TrafficSpikeAlertMessage,
};

const BUCKET_PREFIX: &str = "chat:traffic:";
const COOLDOWN_PREFIX: &str = "chat:traffic-cooldown:";
const MINUTE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficSpikeConfig {
    /// Messages within the window that count as a spike.
    pub threshold: i64,
    /// Window length in one-minute buckets.
    pub window_minutes: u32,
    pub cooldown: Duration,
}

impl Default for TrafficSpikeConfig {
    fn default() -> Self {
        Self {
            threshold: 100,
            window_minutes: 1,
            cooldown: Duration::from_secs(5 * 60),
        }
    }
}

pub struct TrafficSpikeDetector {
    store: Arc<dyn KeyValueStore>,
    queue: Arc<dyn MessageQueue>,
    rooms: Arc<dyn RoomRepository>,
    clock: Arc<dyn Clock>,
    config: TrafficSpikeConfig,
}

impl TrafficSpikeDetector {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        queue: Arc<dyn MessageQueue>,
        rooms: Arc<dyn RoomRepository>,
        clock: Arc<dyn Clock>,
        config: TrafficSpikeConfig,
    ) -> Self {
        Self {
            store,
            queue,
            rooms,
            clock,
            config: TrafficSpikeConfig {
                window_minutes: config.window_minutes.max(1),
                ..config
            },
        }
    }

    fn bucket_key(room_id: &RoomId, minute: i64) -> String {
        format!("{BUCKET_PREFIX}{}:{minute}", room_id.as_str())
    }

    fn cooldown_key(room_id: &RoomId) -> String {
        format!("{COOLDOWN_PREFIX}{}", room_id.as_str())
    }

    fn window(&self) -> impl Iterator<Item = i64> {
        let current = minute_bucket(self.clock.now_millis());
        let oldest = current - i64::from(self.config.window_minutes) + 1;
        oldest..=current
    }

    /// Count one message in the current bucket.
    pub async fn record_message(&self, room_id: &RoomId) -> Result<i64, StoreError> {
        let minute = minute_bucket(self.clock.now_millis());
        let ttl = MINUTE * (self.config.window_minutes + 1);
        self.store
            .increment(&Self::bucket_key(room_id, minute), 1, Some(ttl))
            .await
    }

    /// Messages in the most recent `window` buckets.
    pub async fn current_rate(&self, room_id: &RoomId) -> Result<i64, StoreError> {
        let mut total = 0;
        for minute in self.window() {
            if let Some(count) = self.store.get(&Self::bucket_key(room_id, minute)).await? {
                total += count.parse::<i64>().unwrap_or(0);
            }
        }
        Ok(total)
    }

    pub async fn is_spike(&self, room_id: &RoomId, threshold: i64) -> Result<bool, StoreError> {
        Ok(self.current_rate(room_id).await? >= threshold)
    }

    /// Forget the window buckets and the cooldown.
    pub async fn reset(&self, room_id: &RoomId) -> Result<(), StoreError> {
        for minute in self.window() {
            self.store.delete(&Self::bucket_key(room_id, minute)).await?;
        }
        self.store.delete(&Self::cooldown_key(room_id)).await?;
        Ok(())
    }

    /// Record a message and raise an alert if the room is spiking and not
    /// cooling down. Returns whether an alert was sent.
    pub async fn observe(&self, room_id: &RoomId) -> Result<bool, StoreError> {
        self.record_message(room_id).await?;
        let rate = self.current_rate(room_id).await?;
        if rate < self.config.threshold {
            return Ok(false);
        }

        let cooldown_key = Self::cooldown_key(room_id);
        if !self
            .store
            .set_if_absent(&cooldown_key, "1", self.config.cooldown)
            .await?
        {
            return Ok(false);
        }

        let team_id = match self.rooms.find(room_id).await {
            Ok(room) => room.and_then(|r| r.team_id).map(|t| t.into_string()),
            Err(e) => {
                tracing::warn!("Could not look up team of '{}': {}", room_id, e);
                None
            }
        };
        let alert = TrafficSpikeAlertMessage {
            room_id: room_id.as_str().to_string(),
            team_id,
            message_count: rate,
            threshold: self.config.threshold,
            timestamp: self.clock.now_millis(),
        };
        let payload = match serde_json::to_string(&alert) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize spike alert: {}", e);
                return Ok(false);
            }
        };

        if let Err(e) = self
            .queue
            .send(TOPIC_TRAFFIC_SPIKE_ALERT, room_id.as_str(), &payload)
            .await
        {
            tracing::warn!("Spike alert for '{}' was not sent: {}", room_id, e);
            // 次のメッセージで再送できるようにクールダウンを外す
            self.store.delete(&cooldown_key).await?;
            return Ok(false);
        }
        tracing::info!(
            "Traffic spike in '{}': {} messages (threshold {})",
            room_id,
            rate,
            self.config.threshold
        );
        Ok(true)
    }
}
