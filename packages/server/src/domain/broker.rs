//! Cluster-wide publish/subscribe broker port.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{error::BrokerError, value_object::RoomId};

const ROOM_CHANNEL_PREFIX: &str = "chat:room:";

/// A message delivered by the broker on a channel this instance subscribed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub channel: String,
    pub payload: String,
}

/// Receiving end of a broker connection. Drained by the broadcaster.
pub type BrokerInbox = mpsc::UnboundedReceiver<BrokerMessage>;

/// One instance's connection to the broker.
///
/// Messages for subscribed channels arrive on the [`BrokerInbox`] handed out
/// together with the connection.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError>;

    async fn subscribe(&self, channel: &str) -> Result<(), BrokerError>;

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError>;
}

/// Broker channel carrying one room's traffic.
pub fn room_channel(room_id: &RoomId) -> String {
    format!("{ROOM_CHANNEL_PREFIX}{}", room_id.as_str())
}

/// Inverse of [`room_channel`].
pub fn room_from_channel(channel: &str) -> Option<RoomId> {
    channel
        .strip_prefix(ROOM_CHANNEL_PREFIX)
        .and_then(|id| RoomId::new(id.to_string()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_channel_round_trip() {
        // テスト項目: ルーム ID とチャンネル名は相互に変換できる
        let room = RoomId::new("match-abc".to_string()).unwrap();
        let channel = room_channel(&room);
        assert_eq!(channel, "chat:room:match-abc");
        assert_eq!(room_from_channel(&channel), Some(room));
    }

    #[test]
    fn test_foreign_channel_is_ignored() {
        // テスト項目: 他用途のチャンネル名はルームとして解釈されない
        assert_eq!(room_from_channel("notifications:all"), None);
        assert_eq!(room_from_channel("chat:room:"), None);
    }
}
