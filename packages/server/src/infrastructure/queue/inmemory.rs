//! InMemory MessageQueue 実装
//!
//! トピックごとの FIFO を全購読者で共有し、1 件のレコードは 1 つの購読者にだけ
//! 渡されます（競合コンシューマ）。

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::{MessageQueue, QueueError, QueueRecord, QueueSubscription};

#[derive(Default)]
struct Topic {
    records: Mutex<VecDeque<QueueRecord>>,
    notify: Notify,
}

#[derive(Default)]
pub struct InMemoryMessageQueue {
    topics: Mutex<HashMap<String, Arc<Topic>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn topic(&self, name: &str) -> Arc<Topic> {
        let mut topics = self.topics.lock().await;
        Arc::clone(topics.entry(name.to_string()).or_default())
    }

    /// Wake every consumer; their `next` returns `None` from now on.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let topics = self.topics.lock().await;
        for topic in topics.values() {
            topic.notify.notify_waiters();
        }
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        let target = self.topic(topic).await;
        target.records.lock().await.push_back(QueueRecord {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_string(),
        });
        target.notify.notify_one();
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn QueueSubscription>, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        Ok(Box::new(InMemorySubscription {
            topic: self.topic(topic).await,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct InMemorySubscription {
    topic: Arc<Topic>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl QueueSubscription for InMemorySubscription {
    async fn next(&mut self) -> Option<QueueRecord> {
        loop {
            let notified = self.topic.notify.notified();
            if let Some(record) = self.topic.records.lock().await.pop_front() {
                // 後続のレコードを待っている他の購読者にも順番を回す
                self.topic.notify.notify_one();
                return Some(record);
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_records_are_delivered_in_order() {
        // テスト項目: 送信順にレコードを受け取れる
        // given (前提条件):
        let queue = InMemoryMessageQueue::new();
        let mut sub = queue.subscribe("t").await.unwrap();

        // when (操作):
        queue.send("t", "k1", "one").await.unwrap();
        queue.send("t", "k2", "two").await.unwrap();

        // then (期待する結果):
        assert_eq!(sub.next().await.unwrap().payload, "one");
        assert_eq!(sub.next().await.unwrap().payload, "two");
    }

    #[tokio::test]
    async fn test_each_record_goes_to_one_consumer() {
        // テスト項目: 同じトピックの購読者間でレコードは重複しない
        let queue = InMemoryMessageQueue::new();
        let mut a = queue.subscribe("t").await.unwrap();
        let mut b = queue.subscribe("t").await.unwrap();

        queue.send("t", "k", "only").await.unwrap();

        let first = tokio::time::timeout(Duration::from_millis(100), a.next()).await;
        let second = tokio::time::timeout(Duration::from_millis(100), b.next()).await;
        assert_eq!(first.unwrap().unwrap().payload, "only");
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_waiting_consumer_is_woken_by_send() {
        // テスト項目: 待機中の購読者は送信で起こされる
        let queue = InMemoryMessageQueue::new();
        let mut sub = queue.subscribe("t").await.unwrap();
        let waiter = tokio::spawn(async move { sub.next().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.send("t", "k", "late").await.unwrap();

        let record = waiter.await.unwrap().unwrap();
        assert_eq!(record.key, "k");
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        // テスト項目: close 後は next が None を返し、送信はエラーになる
        let queue = InMemoryMessageQueue::new();
        let mut sub = queue.subscribe("t").await.unwrap();

        queue.close().await;

        assert_eq!(sub.next().await, None);
        assert_eq!(queue.send("t", "k", "x").await, Err(QueueError::Closed));
    }
}
