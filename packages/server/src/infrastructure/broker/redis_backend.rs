//! Redis Pub/Sub MessageBroker 実装 (`redis-backend` feature)

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::{ConnectionManager, PubSubSink};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};

use crate::domain::{BrokerError, BrokerInbox, BrokerMessage, MessageBroker};

fn backend(err: redis::RedisError) -> BrokerError {
    BrokerError::Backend(err.to_string())
}

pub struct RedisBroker {
    publisher: ConnectionManager,
    subscriber: Mutex<PubSubSink>,
    pump: JoinHandle<()>,
}

impl RedisBroker {
    /// Open a publish connection and a dedicated subscribe connection.
    /// Messages of subscribed channels are forwarded to the returned inbox.
    pub async fn connect(client: &redis::Client) -> Result<(Self, BrokerInbox), BrokerError> {
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(backend)?;
        let pubsub = client.get_async_pubsub().await.map_err(backend)?;
        let (sink, mut stream) = pubsub.split();

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!("Dropping undecodable broker payload: {}", e);
                        continue;
                    }
                };
                let message = BrokerMessage {
                    channel: msg.get_channel_name().to_string(),
                    payload,
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
            tracing::info!("Redis subscription stream ended");
        });

        Ok((
            Self {
                publisher,
                subscriber: Mutex::new(sink),
                pump,
            },
            rx,
        ))
    }
}

impl Drop for RedisBroker {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        let mut conn = self.publisher.clone();
        let _: i64 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), BrokerError> {
        let mut sink = self.subscriber.lock().await;
        sink.subscribe(channel).await.map_err(backend)
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        let mut sink = self.subscriber.lock().await;
        sink.unsubscribe(channel).await.map_err(backend)
    }
}
