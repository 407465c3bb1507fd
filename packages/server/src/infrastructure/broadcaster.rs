//! Pub/Sub Broadcaster
//!
//! ローカル接続とクラスタ全体のブローカーを橋渡しします。ルームごとに 1 つの
//! チャンネル（`chat:room:{roomId}`）を使い、ローカルセッションが 1 つ以上ある
//! ルームだけを購読します。
//!
//! 接続へ書き込むのはブローカーからの受信経路（[`Broadcaster::on_broker_message`]）
//! だけです。送信元インスタンスも自分の publish を受信して配送します。
//! publish に失敗した場合だけ、ローカルセッションへ直接配送します。

use std::{collections::HashSet, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    domain::{
        BrokerInbox, ChatEvent, MessageBroker, RoomId, SessionId, room_channel,
        room_from_channel, session::CLOSE_CODE_ROOM_CLOSED,
    },
    infrastructure::{
        dto::{broker::BrokerEnvelope, websocket::ServerEvent},
        registry::ConnectionRegistry,
    },
};

pub struct Broadcaster {
    broker: Arc<dyn MessageBroker>,
    registry: Arc<ConnectionRegistry>,
    /// Rooms whose channel this instance is subscribed to.
    subscribed: Mutex<HashSet<RoomId>>,
}

impl Broadcaster {
    pub fn new(broker: Arc<dyn MessageBroker>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            broker,
            registry,
            subscribed: Mutex::new(HashSet::new()),
        }
    }

    /// Publish a chat event to its room. Never fails the caller.
    pub async fn publish(&self, event: &ChatEvent, skip: Option<SessionId>) {
        self.publish_event(event.room_id(), ServerEvent::from(event), skip)
            .await;
    }

    pub async fn publish_event(&self, room_id: &RoomId, event: ServerEvent, skip: Option<SessionId>) {
        let envelope = BrokerEnvelope::Event {
            event,
            skip_session: skip.map(|id| id.to_string()),
        };
        let listening = self.ensure_subscribed(room_id).await;
        match self.send(room_id, &envelope).await {
            Ok(()) if listening => {}
            Ok(()) => {
                // 購読できていないので自分の publish は戻ってこない
                self.apply(room_id, envelope).await;
            }
            Err(e) => {
                tracing::warn!(
                    "Publish to '{}' failed, delivering locally only: {}",
                    room_id,
                    e
                );
                self.apply(room_id, envelope).await;
            }
        }
    }

    /// Tell every instance to evict the room's sessions.
    pub async fn publish_close(&self, room_id: &RoomId, reason: &str) {
        let envelope = BrokerEnvelope::CloseRoom {
            reason: reason.to_string(),
        };
        let listening = self.ensure_subscribed(room_id).await;
        match self.send(room_id, &envelope).await {
            Ok(()) if listening => {}
            Ok(()) => self.apply(room_id, envelope).await,
            Err(e) => {
                tracing::warn!(
                    "Close of '{}' could not be published, closing locally only: {}",
                    room_id,
                    e
                );
                self.apply(room_id, envelope).await;
            }
        }
    }

    /// Retry a failed subscription. Returns whether this instance will hear
    /// its own publish back from the broker.
    async fn ensure_subscribed(&self, room_id: &RoomId) -> bool {
        self.subscribe_if_first(room_id).await;
        self.is_subscribed(room_id).await
    }

    async fn send(&self, room_id: &RoomId, envelope: &BrokerEnvelope) -> Result<(), String> {
        let payload = serde_json::to_string(envelope).map_err(|e| e.to_string())?;
        self.broker
            .publish(&room_channel(room_id), &payload)
            .await
            .map_err(|e| e.to_string())
    }

    /// Subscribe to the room's channel if this instance holds sessions there
    /// and is not subscribed yet.
    pub async fn subscribe_if_first(&self, room_id: &RoomId) {
        let mut subscribed = self.subscribed.lock().await;
        if subscribed.contains(room_id) || !self.registry.has_sessions(room_id).await {
            return;
        }
        match self.broker.subscribe(&room_channel(room_id)).await {
            Ok(()) => {
                subscribed.insert(room_id.clone());
                tracing::debug!("Subscribed to '{}'", room_id);
            }
            // 未購読のまま残し、次の入室で再試行する
            Err(e) => tracing::error!("Subscribe to '{}' failed: {}", room_id, e),
        }
    }

    /// Unsubscribe from the room's channel once no local session is left.
    pub async fn unsubscribe_if_empty(&self, room_id: &RoomId) {
        let mut subscribed = self.subscribed.lock().await;
        if !subscribed.contains(room_id) || self.registry.has_sessions(room_id).await {
            return;
        }
        subscribed.remove(room_id);
        match self.broker.unsubscribe(&room_channel(room_id)).await {
            Ok(()) => tracing::debug!("Unsubscribed from '{}'", room_id),
            Err(e) => tracing::warn!("Unsubscribe from '{}' failed: {}", room_id, e),
        }
    }

    pub async fn is_subscribed(&self, room_id: &RoomId) -> bool {
        self.subscribed.lock().await.contains(room_id)
    }

    /// Handle one message received from the broker.
    pub async fn on_broker_message(&self, channel: &str, payload: &str) {
        let Some(room_id) = room_from_channel(channel) else {
            tracing::debug!("Ignoring message on foreign channel '{}'", channel);
            return;
        };
        let envelope: BrokerEnvelope = match serde_json::from_str(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Malformed broker payload on '{}': {}", channel, e);
                return;
            }
        };
        self.apply(&room_id, envelope).await;
    }

    async fn apply(&self, room_id: &RoomId, envelope: BrokerEnvelope) {
        match envelope {
            BrokerEnvelope::Event {
                event,
                skip_session,
            } => {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to serialize event for '{}': {}", room_id, e);
                        return;
                    }
                };
                let skip = skip_session
                    .as_deref()
                    .and_then(|id| SessionId::parse(id).ok());
                let pruned = self.registry.deliver(room_id, &text, skip).await;
                if pruned > 0 {
                    self.unsubscribe_if_empty(room_id).await;
                }
            }
            BrokerEnvelope::CloseRoom { reason } => {
                let closed = self
                    .registry
                    .close_room(room_id, CLOSE_CODE_ROOM_CLOSED, &reason)
                    .await;
                if !closed.is_empty() {
                    tracing::info!(
                        "Closed {} local session(s) of '{}': {}",
                        closed.len(),
                        room_id,
                        reason
                    );
                }
                self.unsubscribe_if_empty(room_id).await;
            }
        }
    }

    /// Drain the broker inbox until the connection goes away.
    pub async fn run(self: Arc<Self>, mut inbox: BrokerInbox) {
        while let Some(message) = inbox.recv().await {
            self.on_broker_message(&message.channel, &message.payload)
                .await;
        }
        tracing::info!("Broker inbox closed");
    }
}
