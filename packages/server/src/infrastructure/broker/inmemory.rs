//! InMemory MessageBroker 実装
//!
//! [`InMemoryBrokerHub`] がクラスタ全体のブローカー役を担い、
//! [`InMemoryBrokerHub::connect`] で各インスタンス用の接続を払い出します。

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::domain::{BrokerError, BrokerInbox, BrokerMessage, MessageBroker};

type ConnectionId = u64;

#[derive(Default)]
pub struct InMemoryBrokerHub {
    next_id: AtomicU64,
    /// channel -> (connection -> inbox sender)
    channels: Mutex<HashMap<String, HashMap<ConnectionId, mpsc::UnboundedSender<BrokerMessage>>>>,
}

impl InMemoryBrokerHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Open a broker connection for one instance.
    pub fn connect(self: &Arc<Self>) -> (InMemoryBroker, BrokerInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let broker = InMemoryBroker {
            id,
            hub: Arc::clone(self),
            inbox: tx,
        };
        (broker, rx)
    }

    /// Number of connections subscribed to `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.lock().await;
        channels.get(channel).map_or(0, HashMap::len)
    }
}

pub struct InMemoryBroker {
    id: ConnectionId,
    hub: Arc<InMemoryBrokerHub>,
    inbox: mpsc::UnboundedSender<BrokerMessage>,
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        let mut channels = self.hub.channels.lock().await;
        if let Some(subscribers) = channels.get_mut(channel) {
            // 受信側が閉じた接続はここで掃除する
            subscribers.retain(|_, tx| {
                tx.send(BrokerMessage {
                    channel: channel.to_string(),
                    payload: payload.to_string(),
                })
                .is_ok()
            });
            if subscribers.is_empty() {
                channels.remove(channel);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), BrokerError> {
        if self.inbox.is_closed() {
            return Err(BrokerError::Closed);
        }
        let mut channels = self.hub.channels.lock().await;
        channels
            .entry(channel.to_string())
            .or_default()
            .insert(self.id, self.inbox.clone());
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        let mut channels = self.hub.channels.lock().await;
        if let Some(subscribers) = channels.get_mut(channel) {
            subscribers.remove(&self.id);
            if subscribers.is_empty() {
                channels.remove(channel);
            }
        }
        Ok(())
    }
}
