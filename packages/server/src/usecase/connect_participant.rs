//! UseCase: 参加者接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectParticipantUseCase::execute() メソッド
//! - チケット検証 → 座席確保 → Registry 登録 → チャンネル購読 → 入室通知
//!
//! ### なぜこのテストが必要か
//! - 参加者数が定員を超えないことを保証
//! - WATCH ルームの単一セッション制約（古いセッションへの close）を確認
//! - 登録に失敗したときに確保した座席が戻ることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規参加者の接続と user_join の配信
//! - 異常系：不正なチケット、満員、クローズ済みルーム
//! - エッジケース：同一ユーザーの再接続（WATCH は置き換えて座席を引き継ぐ、MATCH は併存）

use std::sync::Arc;

use bleachers_shared::time::Clock;

use crate::{
    domain::{
        AdmissionController, ChatEvent, ChatSession, PusherChannel, RoomId, TicketId,
        TicketRepository, Timestamp,
    },
    infrastructure::{broadcaster::Broadcaster, registry::ConnectionRegistry},
};

use super::error::ConnectError;

/// 参加者接続のユースケース
pub struct ConnectParticipantUseCase {
    tickets: Arc<dyn TicketRepository>,
    controller: Arc<AdmissionController>,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
}

impl ConnectParticipantUseCase {
    /// 新しい ConnectParticipantUseCase を作成
    pub fn new(
        tickets: Arc<dyn TicketRepository>,
        controller: Arc<AdmissionController>,
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<Broadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tickets,
            controller,
            registry,
            broadcaster,
            clock,
        }
    }

    /// 参加者接続を実行
    ///
    /// # Arguments
    ///
    /// * `room_id` - 接続先のルーム
    /// * `ticket_id` - 入室申請で発行されたチケット
    /// * `sender` - クライアントへのフレーム送信用チャンネル
    ///
    /// # Returns
    ///
    /// * `Ok(ChatSession)` - 登録されたセッション
    /// * `Err(ConnectError)` - 接続失敗（Registry も座席数も変化しない）
    pub async fn execute(
        &self,
        room_id: &RoomId,
        ticket_id: &TicketId,
        sender: PusherChannel,
    ) -> Result<ChatSession, ConnectError> {
        let now = Timestamp::new(self.clock.now_millis());

        // 1. チケット検証
        let ticket = self
            .tickets
            .find(ticket_id)
            .await?
            .filter(|t| t.is_for(room_id) && t.expires_at >= now)
            .ok_or(ConnectError::InvalidTicket)?;

        // 2. 座席確保（定員を超える場合はここで拒否）
        //    WATCH の再接続は置き換える古いセッションの座席を引き継ぐ
        let session = ticket.open_session(now);
        let replacing = session.family.is_single_session()
            && self.registry.user_in_room(&session.user_id, room_id).await;
        if !replacing {
            self.controller.occupy_seat(room_id, now).await?;
        }

        // 3. Registry に登録
        let registered = if replacing {
            self.registry.replace(session.clone(), sender).await
        } else {
            self.registry.accept(session.clone(), sender).await
        };
        let outcome = match registered {
            Ok(outcome) => outcome,
            Err(e) => {
                if !replacing {
                    self.give_back_seat(room_id, now).await;
                }
                return Err(e.into());
            }
        };
        if replacing && !outcome.seat_reused {
            // 古いセッションが先に切断して座席を返していた
            if let Err(e) = self.controller.occupy_seat(room_id, now).await {
                self.registry.remove(&session.id).await;
                return Err(e.into());
            }
        }

        // 4. チャンネル購読（このインスタンスで最初のセッションなら）
        self.broadcaster.subscribe_if_first(room_id).await;

        // 5. 入室通知（置き換えによる再接続では通知しない）
        if !outcome.already_present {
            let event = ChatEvent::UserJoin {
                session: session.clone(),
                at: now,
            };
            self.broadcaster.publish(&event, Some(session.id)).await;
        }

        tracing::info!(
            "Session {} of '{}' connected to '{}' ({} replaced)",
            session.id,
            session.user_id,
            room_id,
            outcome.evicted.len()
        );
        Ok(session)
    }

    async fn give_back_seat(&self, room_id: &RoomId, now: Timestamp) {
        if let Err(e) = self.controller.release_seat(room_id, now).await {
            tracing::error!("Failed to give back the seat in '{}': {}", room_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            AdmissionError, Outbound, RoomRepository, RoomStatus, session::CLOSE_CODE_REPLACED,
        },
        infrastructure::registry::RegistryError,
        usecase::{
            DisconnectParticipantUseCase,
            testing::{World, is_quiet, next_event, next_frame},
        },
    };
    use tokio::sync::mpsc;

    fn create_usecase(world: &World) -> ConnectParticipantUseCase {
        ConnectParticipantUseCase::new(
            world.tickets.clone(),
            world.controller.clone(),
            world.registry.clone(),
            world.broadcaster.clone(),
            world.clock.clone(),
        )
    }

    #[tokio::test]
    async fn test_connect_takes_seat_and_announces_join() {
        // テスト項目: 接続すると座席が 1 つ埋まり、既存の参加者に user_join が届く
        // given (前提条件):
        let world = World::new();
        let usecase = create_usecase(&world);
        let room = world.match_room("owner", 4).await;
        let alice = world.ticket("alice", &room).await;
        let bob = world.ticket("bob", &room).await;
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        usecase.execute(&room.id, &alice.id, tx_a).await.unwrap();

        // when (操作):
        let session = usecase.execute(&room.id, &bob.id, tx_b).await.unwrap();

        // then (期待する結果):
        let joined = next_event(&mut rx_a).await;
        assert_eq!(joined["type"], "user_join");
        assert_eq!(joined["userId"], "bob");
        // 本人には自分の user_join は届かない
        assert!(is_quiet(&mut rx_b).await);

        let stored = world.rooms.find(&room.id).await.unwrap().unwrap();
        assert_eq!(stored.current_participants, 2);
        assert!(world.broadcaster.is_subscribed(&room.id).await);
        assert_eq!(session.user_id.as_str(), "bob");
    }

    #[tokio::test]
    async fn test_connect_to_full_room_is_rejected_without_mutation() {
        // テスト項目: 満員のルームへの接続は拒否され、Registry も座席数も変わらない
        // given (前提条件):
        let world = World::new();
        let usecase = create_usecase(&world);
        let room = world.match_room("owner", 1).await;
        let alice = world.ticket("alice", &room).await;
        let bob = world.ticket("bob", &room).await;
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        usecase.execute(&room.id, &alice.id, tx_a).await.unwrap();

        // when (操作):
        let result = usecase.execute(&room.id, &bob.id, tx_b).await;

        // then (期待する結果):
        assert_eq!(result, Err(ConnectError::Admission(AdmissionError::RoomFull)));
        assert_eq!(world.registry.sessions_for_room(&room.id).await.len(), 1);
        let stored = world.rooms.find(&room.id).await.unwrap().unwrap();
        assert_eq!(stored.current_participants, 1);
    }

    #[tokio::test]
    async fn test_ticket_for_another_room_is_invalid() {
        // テスト項目: 別ルーム用のチケットや存在しないチケットでは接続できない
        let world = World::new();
        let usecase = create_usecase(&world);
        let room = world.match_room("owner", 4).await;
        let other = world.match_room("owner", 4).await;
        let ticket = world.ticket("alice", &other).await;
        let (tx, _rx) = mpsc::unbounded_channel();

        let wrong_room = usecase.execute(&room.id, &ticket.id, tx.clone()).await;
        let unknown = usecase.execute(&room.id, &TicketId::generate(), tx).await;

        assert_eq!(wrong_room, Err(ConnectError::InvalidTicket));
        assert_eq!(unknown, Err(ConnectError::InvalidTicket));
    }

    #[tokio::test]
    async fn test_ticket_is_reusable_until_expiry() {
        // テスト項目: チケットは有効期限まで再接続に使え、期限後は使えない
        // given (前提条件):
        let world = World::new();
        let usecase = create_usecase(&world);
        let room = world.match_room("owner", 4).await;
        let ticket = world.ticket("alice", &room).await;
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let (tx3, _rx3) = mpsc::unbounded_channel();

        // when (操作):
        let first = usecase.execute(&room.id, &ticket.id, tx1).await;
        let again = usecase.execute(&room.id, &ticket.id, tx2).await;
        world.clock.advance_millis(301_000);
        let expired = usecase.execute(&room.id, &ticket.id, tx3).await;

        // then (期待する結果):
        assert!(first.is_ok());
        assert!(again.is_ok());
        assert_eq!(expired, Err(ConnectError::InvalidTicket));
    }

    #[tokio::test]
    async fn test_second_watch_session_replaces_the_first() {
        // テスト項目: WATCH ルームで同じユーザーが再接続すると、古いセッションに close が送られ 1 つだけ残る
        // given (前提条件):
        let world = World::new();
        let usecase = create_usecase(&world);
        let game = world.game_today("G", "T", "U").await;
        let room = world.watch_room(&game, "T").await;
        let ticket = world.ticket("fan", &room).await;
        let (tx_old, mut rx_old) = mpsc::unbounded_channel();
        let (tx_new, _rx_new) = mpsc::unbounded_channel();
        let old = usecase.execute(&room.id, &ticket.id, tx_old).await.unwrap();

        // when (操作):
        let new = usecase.execute(&room.id, &ticket.id, tx_new).await.unwrap();

        // then (期待する結果):
        let sessions = world.registry.sessions_for_room(&room.id).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, new.id);
        assert_ne!(old.id, new.id);
        match next_frame(&mut rx_old).await {
            Outbound::Close { code, .. } => assert_eq!(code, CLOSE_CODE_REPLACED),
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reconnect_to_full_watch_room_takes_over_the_seat() {
        // テスト項目: 満員の WATCH ルームでも本人の再接続は古いセッションを置き換え、座席数は変わらない
        // given (前提条件):
        let world = World::new();
        let connect = create_usecase(&world);
        let disconnect = DisconnectParticipantUseCase::new(
            world.controller.clone(),
            world.registry.clone(),
            world.broadcaster.clone(),
            world.clock.clone(),
        );
        let game = world.game_today("G", "T", "U").await;
        let room = world.watch_room_with_capacity(&game, "T", 1).await;
        let ticket = world.ticket("fan", &room).await;
        let (tx_old, mut rx_old) = mpsc::unbounded_channel();
        let (tx_new, _rx_new) = mpsc::unbounded_channel();
        let old = connect.execute(&room.id, &ticket.id, tx_old).await.unwrap();

        // when (操作):
        let new = connect.execute(&room.id, &ticket.id, tx_new).await;
        next_frame(&mut rx_old).await;
        disconnect.execute(&old).await;

        // then (期待する結果):
        let new = new.unwrap();
        let sessions = world.registry.sessions_for_room(&room.id).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, new.id);
        let stored = world.rooms.find(&room.id).await.unwrap().unwrap();
        assert_eq!(stored.current_participants, 1);
        assert_eq!(stored.status, RoomStatus::Full);
    }

    #[tokio::test]
    async fn test_full_watch_room_still_refuses_other_users() {
        // テスト項目: 座席の引き継ぎは本人の再接続だけで、満員の WATCH ルームに別ユーザーは入れない
        let world = World::new();
        let connect = create_usecase(&world);
        let game = world.game_today("G", "T", "U").await;
        let room = world.watch_room_with_capacity(&game, "T", 1).await;
        let fan = world.ticket("fan", &room).await;
        let other = world.ticket("other", &room).await;
        let (tx_fan, _rx_fan) = mpsc::unbounded_channel();
        let (tx_other, _rx_other) = mpsc::unbounded_channel();
        connect.execute(&room.id, &fan.id, tx_fan).await.unwrap();

        let refused = connect.execute(&room.id, &other.id, tx_other).await;

        assert_eq!(refused, Err(ConnectError::Admission(AdmissionError::RoomFull)));
        let stored = world.rooms.find(&room.id).await.unwrap().unwrap();
        assert_eq!(stored.current_participants, 1);
    }

    #[tokio::test]
    async fn test_match_sessions_of_one_user_coexist() {
        // テスト項目: MATCH ルームでは同じユーザーの N 接続が N セッションとして残る
        let world = World::new();
        let usecase = create_usecase(&world);
        let room = world.match_room("owner", 10).await;
        let ticket = world.ticket("kim", &room).await;

        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::unbounded_channel();
            usecase.execute(&room.id, &ticket.id, tx).await.unwrap();
            receivers.push(rx);
        }

        assert_eq!(world.registry.sessions_for_room(&room.id).await.len(), 3);
        assert_eq!(
            world
                .registry
                .sessions_for_user(&ticket.user_id)
                .await
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn test_registry_refusal_gives_the_seat_back() {
        // テスト項目: Registry が受け付けなかった場合、確保した座席は戻される
        // given (前提条件):
        let world = World::new();
        let usecase = create_usecase(&world);
        let room = world.match_room("owner", 4).await;
        let ticket = world.ticket("alice", &room).await;
        world.registry.shutdown(1001, "bye").await;
        let (tx, _rx) = mpsc::unbounded_channel();

        // when (操作):
        let result = usecase.execute(&room.id, &ticket.id, tx).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ConnectError::Registry(RegistryError::ShuttingDown))
        );
        let stored = world.rooms.find(&room.id).await.unwrap().unwrap();
        assert_eq!(stored.current_participants, 0);
    }
}
