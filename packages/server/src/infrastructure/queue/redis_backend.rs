//! Redis list MessageQueue 実装 (`redis-backend` feature)
//!
//! トピックごとに 1 本のリストを使い、LPUSH で積んで BRPOP で取り出します。
//! BRPOP は 1 件を 1 つの接続にだけ返すため、競合コンシューマになります。

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use serde::{Deserialize, Serialize};

use crate::domain::{MessageQueue, QueueError, QueueRecord, QueueSubscription};

const LIST_PREFIX: &str = "chat:queue:";
const POP_TIMEOUT_SECS: f64 = 1.0;
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Serialize, Deserialize)]
struct ListEntry {
    key: String,
    payload: String,
}

fn backend(err: redis::RedisError) -> QueueError {
    QueueError::Backend(err.to_string())
}

fn list_name(topic: &str) -> String {
    format!("{LIST_PREFIX}{topic}")
}

pub struct RedisMessageQueue {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisMessageQueue {
    pub async fn connect(client: &redis::Client) -> Result<Self, QueueError> {
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(backend)?;
        Ok(Self {
            client: client.clone(),
            conn,
        })
    }
}

#[async_trait]
impl MessageQueue for RedisMessageQueue {
    async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), QueueError> {
        let entry = serde_json::to_string(&ListEntry {
            key: key.to_string(),
            payload: payload.to_string(),
        })
        .map_err(|e| QueueError::Backend(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("LPUSH")
            .arg(list_name(topic))
            .arg(entry)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn QueueSubscription>, QueueError> {
        // BRPOP blocks its connection, so every subscription gets its own.
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;
        Ok(Box::new(RedisSubscription {
            topic: topic.to_string(),
            conn,
        }))
    }
}

struct RedisSubscription {
    topic: String,
    conn: MultiplexedConnection,
}

#[async_trait]
impl QueueSubscription for RedisSubscription {
    async fn next(&mut self) -> Option<QueueRecord> {
        let list = list_name(&self.topic);
        loop {
            let popped: Option<(String, String)> = match redis::cmd("BRPOP")
                .arg(&list)
                .arg(POP_TIMEOUT_SECS)
                .query_async(&mut self.conn)
                .await
            {
                Ok(popped) => popped,
                Err(e) if e.is_io_error() || e.is_connection_dropped() => {
                    tracing::error!("Queue connection for '{}' lost: {}", self.topic, e);
                    return None;
                }
                Err(e) => {
                    tracing::warn!("BRPOP on '{}' failed: {}", self.topic, e);
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };
            let Some((_, raw)) = popped else {
                continue;
            };
            match serde_json::from_str::<ListEntry>(&raw) {
                Ok(entry) => {
                    return Some(QueueRecord {
                        topic: self.topic.clone(),
                        key: entry.key,
                        payload: entry.payload,
                    });
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed entry on '{}': {}", self.topic, e);
                }
            }
        }
    }
}
