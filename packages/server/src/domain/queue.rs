//! Durable message queue port (topics shared with other services).

use async_trait::async_trait;

use super::error::QueueError;

/// Authorization requests for watch rooms.
pub const TOPIC_AUTH_REQUEST_WATCH: &str = "auth-request.watch";
/// Authorization requests for match rooms.
pub const TOPIC_AUTH_REQUEST_MATCH: &str = "auth-request.match";
/// Authorization results, for every chat type.
pub const TOPIC_AUTH_RESULT: &str = "auth-result";
/// Traffic spike alerts, consumed by the notification service.
pub const TOPIC_TRAFFIC_SPIKE_ALERT: &str = "traffic-spike-alert";
/// Game schedule updates, produced by the schedule crawler.
pub const TOPIC_GAME_SCHEDULE: &str = "game-schedule";

/// One record read from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// Consumer of one topic. Records are shared between all consumers of the
/// topic: each record is handed to exactly one of them.
#[async_trait]
pub trait QueueSubscription: Send {
    /// Next record, waiting for one if necessary. `None` once the queue closed.
    async fn next(&mut self) -> Option<QueueRecord>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), QueueError>;

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn QueueSubscription>, QueueError>;
}
