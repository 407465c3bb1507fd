//! UseCase: メッセージ送信処理
//!
//! 本文を検証してルームのチャンネルへ publish し、トラフィック監視に 1 件数えます。
//! 配送はブローカーからの受信経路が行うため、このユースケースは接続へ直接書き込みません。

use std::sync::Arc;

use bleachers_shared::time::Clock;

use crate::{
    domain::{ChatEvent, ChatSession, MessageContent, Timestamp},
    infrastructure::{broadcaster::Broadcaster, traffic::TrafficSpikeDetector},
};

use super::error::SendMessageError;

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    broadcaster: Arc<Broadcaster>,
    traffic: Arc<TrafficSpikeDetector>,
    clock: Arc<dyn Clock>,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        traffic: Arc<TrafficSpikeDetector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            broadcaster,
            traffic,
            clock,
        }
    }

    /// メッセージ送信を実行
    ///
    /// # Returns
    ///
    /// * `Ok(())` - publish した（ブローカー障害時はローカル配送に縮退）
    /// * `Err(SendMessageError)` - 本文が空、または 500 文字を超える
    pub async fn execute(
        &self,
        session: &ChatSession,
        content: String,
    ) -> Result<(), SendMessageError> {
        let content = MessageContent::new(content)?;
        let event = ChatEvent::Message {
            session: session.clone(),
            content,
            sent_at: Timestamp::new(self.clock.now_millis()),
        };
        self.broadcaster.publish(&event, None).await;

        if let Err(e) = self.traffic.observe(&session.room_id).await {
            tracing::warn!(
                "Traffic counter for '{}' is unavailable: {}",
                session.room_id,
                e
            );
        }
        Ok(())
    }
}
