//! Room admission: per-family business rules and the room lifecycle.
//!
//! Each room family plugs in an [`AdmissionStrategy`]. The
//! [`AdmissionController`] picks the strategy by the room's family tag and is
//! the only place that moves rooms through `ACTIVE ⇄ FULL → CLOSED`.

mod matching;
mod watch;

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    auth::UserInfo,
    entity::{Room, RoomFamily, RoomStatus, RoomTransition, SeatChange},
    error::AdmissionError,
    repository::{RoomRepository, SeatOutcome},
    value_object::{RoomId, Timestamp},
};

pub use matching::MatchAdmission;
pub use watch::WatchAdmission;

/// Business rules deciding whether a caller may enter a room of one family.
#[async_trait]
pub trait AdmissionStrategy: Send + Sync {
    fn family(&self) -> RoomFamily;

    async fn validate(&self, caller: &UserInfo, room: &Room) -> Result<(), AdmissionError>;
}

/// Room Admission Controller
pub struct AdmissionController {
    rooms: Arc<dyn RoomRepository>,
    watch: Arc<dyn AdmissionStrategy>,
    matching: Arc<dyn AdmissionStrategy>,
}

impl AdmissionController {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        watch: Arc<dyn AdmissionStrategy>,
        matching: Arc<dyn AdmissionStrategy>,
    ) -> Self {
        Self {
            rooms,
            watch,
            matching,
        }
    }

    fn strategy_for(&self, family: RoomFamily) -> &dyn AdmissionStrategy {
        match family {
            RoomFamily::Watch => self.watch.as_ref(),
            RoomFamily::Match => self.matching.as_ref(),
        }
    }

    /// Condition check shared by create and join.
    pub async fn evaluate(&self, caller: &UserInfo, room: &Room) -> Result<(), AdmissionError> {
        if room.is_closed() {
            return Err(AdmissionError::RoomClosed);
        }
        self.strategy_for(room.family).validate(caller, room).await
    }

    /// Decide whether `caller` may join an existing room.
    pub async fn admit(&self, caller: &UserInfo, room_id: &RoomId) -> Result<Room, AdmissionError> {
        let room = self
            .rooms
            .find(room_id)
            .await?
            .ok_or(AdmissionError::RoomNotFound)?;
        match room.status {
            RoomStatus::Closed => return Err(AdmissionError::RoomClosed),
            RoomStatus::Full => return Err(AdmissionError::RoomFull),
            RoomStatus::Active => {}
        }
        self.evaluate(caller, &room).await?;
        Ok(room)
    }

    /// Validate `caller` against a new room and bring it into existence at
    /// `ACTIVE` with zero participants.
    ///
    /// Creating a room that already exists returns the stored room after
    /// running the same checks against it (watch rooms have deterministic ids).
    pub async fn create(&self, caller: &UserInfo, room: Room) -> Result<Room, AdmissionError> {
        self.evaluate(caller, &room).await?;
        if self.rooms.insert(&room).await? {
            tracing::info!(
                "Room '{}' ({}) created",
                room.id,
                room.family.as_str()
            );
            return Ok(room);
        }

        let existing = self
            .rooms
            .find(&room.id)
            .await?
            .ok_or(AdmissionError::RoomNotFound)?;
        if existing.status == RoomStatus::Full {
            return Err(AdmissionError::RoomFull);
        }
        self.evaluate(caller, &existing).await?;
        Ok(existing)
    }

    /// Open a room without a caller (upstream game-schedule events).
    /// Returns `false` when it already existed.
    pub async fn open(&self, room: &Room) -> Result<bool, AdmissionError> {
        Ok(self.rooms.insert(room).await?)
    }

    /// Take a seat for a connecting session.
    pub async fn occupy_seat(
        &self,
        room_id: &RoomId,
        now: Timestamp,
    ) -> Result<SeatChange, AdmissionError> {
        match self.rooms.occupy_seat(room_id, now).await? {
            SeatOutcome::Taken(change) => {
                if change.status == RoomStatus::Full {
                    tracing::info!("Room '{}' is now FULL ({})", room_id, change.current);
                }
                Ok(change)
            }
            SeatOutcome::Full => Err(AdmissionError::RoomFull),
            SeatOutcome::Closed => Err(AdmissionError::RoomClosed),
            SeatOutcome::NotFound => Err(AdmissionError::RoomNotFound),
        }
    }

    /// Give back the seat of a session that left.
    pub async fn release_seat(
        &self,
        room_id: &RoomId,
        now: Timestamp,
    ) -> Result<Option<SeatChange>, AdmissionError> {
        let change = self.rooms.release_seat(room_id, now).await?;
        if let Some(change) = change {
            let before = RoomStatus::derive(change.current + 1, change.max, false);
            let after = before.on(
                RoomTransition::SeatReleased {
                    current: change.current,
                },
                change.max,
            )?;
            if before == RoomStatus::Full && after == RoomStatus::Active {
                tracing::info!("Room '{}' is ACTIVE again ({})", room_id, change.current);
            }
        }
        Ok(change)
    }

    /// Close a room. Returns `false` when it was already closed.
    pub async fn close(&self, room_id: &RoomId, now: Timestamp) -> Result<bool, AdmissionError> {
        let room = self
            .rooms
            .find(room_id)
            .await?
            .ok_or(AdmissionError::RoomNotFound)?;
        room.status.on(RoomTransition::Close, room.max_participants)?;
        let closed = self.rooms.mark_closed(room_id, now).await?;
        if closed {
            tracing::info!("Room '{}' CLOSED", room_id);
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::TeamId,
        usecase::testing::{World, user},
    };

    #[tokio::test]
    async fn test_concurrent_seats_never_exceed_capacity() {
        // テスト項目: 定員 3 のルームに 10 人が同時に入ろうとしても 3 席しか埋まらない
        // given (前提条件):
        let world = World::new();
        let room = world.match_room("owner", 3).await;

        // when (操作):
        let attempts = (0..10).map(|_| {
            let controller = world.controller.clone();
            let room_id = room.id.clone();
            let now = world.now();
            tokio::spawn(async move { controller.occupy_seat(&room_id, now).await })
        });
        let mut taken = 0;
        let mut full = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            match attempt.await.unwrap() {
                Ok(_) => taken += 1,
                Err(AdmissionError::RoomFull) => full += 1,
                Err(e) => panic!("unexpected {e:?}"),
            }
        }

        // then (期待する結果):
        assert_eq!((taken, full), (3, 7));
        let stored = world.rooms.find(&room.id).await.unwrap().unwrap();
        assert_eq!(stored.current_participants, 3);
        assert_eq!(stored.status, RoomStatus::Full);
    }

    #[tokio::test]
    async fn test_full_room_becomes_active_when_a_seat_frees() {
        // テスト項目: FULL のルームは join を拒否し、1 席空くと ACTIVE に戻る
        let world = World::new();
        let room = world.match_room("owner", 1).await;
        world.controller.occupy_seat(&room.id, world.now()).await.unwrap();

        let rejected = world.controller.admit(&user("late", None), &room.id).await;
        let released = world
            .controller
            .release_seat(&room.id, world.now())
            .await
            .unwrap();
        let admitted = world.controller.admit(&user("late", None), &room.id).await;

        assert_eq!(rejected, Err(AdmissionError::RoomFull));
        assert_eq!(released.map(|c| (c.current, c.status)), Some((0, RoomStatus::Active)));
        assert!(admitted.is_ok());
    }

    #[tokio::test]
    async fn test_release_never_goes_below_zero() {
        // テスト項目: 空のルームで席を返しても参加者数は 0 のまま
        let world = World::new();
        let room = world.match_room("owner", 2).await;

        let released = world
            .controller
            .release_seat(&room.id, world.now())
            .await
            .unwrap();

        assert_eq!(released, None);
        let stored = world.rooms.find(&room.id).await.unwrap().unwrap();
        assert_eq!(stored.current_participants, 0);
    }

    #[tokio::test]
    async fn test_watch_create_returns_existing_room() {
        // テスト項目: 同じチームの観戦ルームを 2 回作成しても同じルームが返る
        // given (前提条件):
        let world = World::new();
        let game = world.game_today("G1", "LG", "KT").await;
        let caller = user("fan", Some("LG"));
        let draft = || {
            Room::new_watch(
                &game,
                TeamId::new("LG".to_string()).unwrap(),
                1000,
                world.now(),
            )
            .unwrap()
        };

        // when (操作):
        let first = world.controller.create(&caller, draft()).await.unwrap();
        world.controller.occupy_seat(&first.id, world.now()).await.unwrap();
        let second = world.controller.create(&caller, draft()).await.unwrap();

        // then (期待する結果):
        assert_eq!(first.id, second.id);
        assert_eq!(second.family, RoomFamily::Watch);
        assert_eq!(second.current_participants, 1);
    }

    #[tokio::test]
    async fn test_watch_create_rejects_other_team_fan() {
        // テスト項目: 相手チームのファンは観戦ルームを作成できない
        let world = World::new();
        let game = world.game_today("G1", "LG", "KT").await;
        let room = Room::new_watch(
            &game,
            TeamId::new("LG".to_string()).unwrap(),
            1000,
            world.now(),
        )
        .unwrap();

        let result = world.controller.create(&user("rival", Some("KT")), room).await;

        assert_eq!(result, Err(AdmissionError::TeamMismatch));
    }

    #[tokio::test]
    async fn test_closed_is_terminal() {
        // テスト項目: CLOSED のルームは席を取れず、再クローズは false を返す
        let world = World::new();
        let room = world.match_room("owner", 4).await;

        let first = world.controller.close(&room.id, world.now()).await;
        let again = world.controller.close(&room.id, world.now()).await;
        let seat = world.controller.occupy_seat(&room.id, world.now()).await;
        let admit = world.controller.admit(&user("late", None), &room.id).await;

        assert_eq!(first, Ok(true));
        assert_eq!(again, Ok(false));
        assert_eq!(seat, Err(AdmissionError::RoomClosed));
        assert_eq!(admit, Err(AdmissionError::RoomClosed));
    }
}
