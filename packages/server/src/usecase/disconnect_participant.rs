//! UseCase: 参加者切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectParticipantUseCase::execute() メソッド
//! - Registry からの削除、座席の返却、退室通知、チャンネル購読解除
//!
//! ### なぜこのテストが必要か
//! - 切断時に他の参加者へ user_leave が 1 回だけ届くことを保証
//! - 置き換えられたセッションの切断では退室通知が出ないことを確認
//! - 最後のローカルセッションが抜けたらチャンネル購読が外れることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：参加者の切断と通知
//! - エッジケース：置き換え済み・配送失敗で既に Registry から外れたセッションの切断

use std::sync::Arc;

use bleachers_shared::time::Clock;

use crate::{
    domain::{AdmissionController, ChatEvent, ChatSession, Timestamp},
    infrastructure::{broadcaster::Broadcaster, registry::ConnectionRegistry},
};

/// What a disconnect changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected {
    /// Whether the session was still registered.
    pub removed: bool,
    /// Whether `user_leave` was announced (the user has no session left in the room).
    pub left_room: bool,
}

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    controller: Arc<AdmissionController>,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
}

impl DisconnectParticipantUseCase {
    /// 新しい DisconnectParticipantUseCase を作成
    pub fn new(
        controller: Arc<AdmissionController>,
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<Broadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            controller,
            registry,
            broadcaster,
            clock,
        }
    }

    /// 参加者切断を実行
    ///
    /// 受け付けたセッション 1 つにつき 1 回だけ呼ばれる前提です。
    /// インフラのエラーはログに残して吸収します。
    pub async fn execute(&self, session: &ChatSession) -> Disconnected {
        let now = Timestamp::new(self.clock.now_millis());
        let room_id = &session.room_id;

        // 1. Registry から削除（置き換え・配送失敗で既に外れていることもある）
        let removed = self.registry.remove(&session.id).await.is_some();

        // 2. 座席を返す（再接続に引き継いだ座席は返さない）
        if self.registry.take_seat_handover(&session.id).await {
            tracing::debug!("Seat of session {} stays with its successor", session.id);
        } else if let Err(e) = self.controller.release_seat(room_id, now).await {
            tracing::error!("Failed to release a seat in '{}': {}", room_id, e);
        }

        // 3. ユーザーがこのルームにもういなければ退室を通知
        let left_room = !self.registry.user_in_room(&session.user_id, room_id).await;
        if left_room {
            let event = ChatEvent::UserLeave {
                session: session.clone(),
                at: now,
            };
            self.broadcaster.publish(&event, None).await;
        }

        // 4. 最後のローカルセッションならチャンネル購読を解除
        self.broadcaster.unsubscribe_if_empty(room_id).await;

        tracing::info!(
            "Session {} of '{}' left '{}'",
            session.id,
            session.user_id,
            room_id
        );
        Disconnected { removed, left_room }
    }
}
