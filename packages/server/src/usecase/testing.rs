//! In-process fixture shared by the use case tests: one instance over
//! in-memory adapters, driven by a manual clock.

use std::{sync::Arc, time::Duration};

use bleachers_shared::time::{Clock, ManualClock, zone_offset};
use tokio::sync::mpsc;

use crate::{
    domain::{
        AdmissionController, AdmissionTicket, DisplayName, Game, GameId, GameRepository,
        GameStatus, MatchAdmission, MatchConditions, Outbound, Room, RoomId, RoomRepository,
        TeamId, TicketId, TicketRepository, Timestamp, UserId, UserInfo, WatchAdmission,
    },
    infrastructure::{
        broadcaster::Broadcaster,
        broker::InMemoryBrokerHub,
        queue::InMemoryMessageQueue,
        registry::ConnectionRegistry,
        repository::{KvGameRepository, KvRoomRepository, KvTicketRepository},
        store::InMemoryKeyValueStore,
        traffic::{TrafficSpikeConfig, TrafficSpikeDetector},
    },
};

// 2026-10-19 12:00:00 +09:00
pub(crate) const NOON: i64 = 1_792_378_800_000;

pub(crate) fn user(id: &str, team: Option<&str>) -> UserInfo {
    UserInfo {
        user_id: UserId::new(id.to_string()).unwrap(),
        nickname: id.to_string(),
        age: None,
        gender: None,
        team_id: team.map(|t| TeamId::new(t.to_string()).unwrap()),
        win_rate: None,
        profile_image_url: None,
        is_winning_fairy: false,
    }
}

pub(crate) struct World {
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryKeyValueStore>,
    pub queue: Arc<InMemoryMessageQueue>,
    pub hub: Arc<InMemoryBrokerHub>,
    pub rooms: Arc<KvRoomRepository>,
    pub games: Arc<KvGameRepository>,
    pub tickets: Arc<KvTicketRepository>,
    pub controller: Arc<AdmissionController>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Arc<Broadcaster>,
    pub traffic: Arc<TrafficSpikeDetector>,
}

impl World {
    /// Must be called inside a tokio runtime: the broker inbox is drained by
    /// a spawned task.
    pub fn new() -> Self {
        Self::with_spike_threshold(100)
    }

    pub fn with_spike_threshold(threshold: i64) -> Self {
        let clock = Arc::new(ManualClock::new(NOON));
        let store = Arc::new(InMemoryKeyValueStore::new(clock.clone()));
        let queue = InMemoryMessageQueue::new();
        let hub = InMemoryBrokerHub::new();
        let rooms = Arc::new(KvRoomRepository::new(
            store.clone(),
            Duration::from_secs(24 * 3600),
        ));
        let games = Arc::new(KvGameRepository::new(
            store.clone(),
            Duration::from_secs(48 * 3600),
        ));
        let tickets = Arc::new(KvTicketRepository::new(store.clone()));
        let controller = Arc::new(AdmissionController::new(
            rooms.clone(),
            Arc::new(WatchAdmission::new(
                games.clone(),
                clock.clone(),
                zone_offset(9),
            )),
            Arc::new(MatchAdmission::new()),
        ));
        let registry = Arc::new(ConnectionRegistry::new());
        let (broker, inbox) = hub.connect();
        let broadcaster = Arc::new(Broadcaster::new(Arc::new(broker), registry.clone()));
        tokio::spawn(broadcaster.clone().run(inbox));
        let traffic = Arc::new(TrafficSpikeDetector::new(
            store.clone(),
            queue.clone(),
            rooms.clone(),
            clock.clone(),
            TrafficSpikeConfig {
                threshold,
                ..TrafficSpikeConfig::default()
            },
        ));
        Self {
            clock,
            store,
            queue,
            hub,
            rooms,
            games,
            tickets,
            controller,
            registry,
            broadcaster,
            traffic,
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// Save a game starting this evening.
    pub async fn game_today(&self, id: &str, home: &str, away: &str) -> Game {
        let game = Game {
            id: GameId::new(id.to_string()).unwrap(),
            home_team_id: TeamId::new(home.to_string()).unwrap(),
            away_team_id: TeamId::new(away.to_string()).unwrap(),
            starts_at: Timestamp::new(NOON + 6 * 3_600_000),
            status: GameStatus::Scheduled,
        };
        self.games.save(&game).await.unwrap();
        game
    }

    pub async fn watch_room(&self, game: &Game, team: &str) -> Room {
        self.watch_room_with_capacity(game, team, 1000).await
    }

    pub async fn watch_room_with_capacity(&self, game: &Game, team: &str, capacity: u32) -> Room {
        let room = Room::new_watch(
            game,
            TeamId::new(team.to_string()).unwrap(),
            capacity,
            self.now(),
        )
        .unwrap();
        assert!(self.rooms.insert(&room).await.unwrap());
        room
    }

    pub async fn match_room(&self, owner: &str, max: u32) -> Room {
        let room = Room::new_match(
            RoomId::generate_match(),
            UserId::new(owner.to_string()).unwrap(),
            "after the game".to_string(),
            None,
            None,
            max,
            MatchConditions::open(),
            self.now(),
        )
        .unwrap();
        assert!(self.rooms.insert(&room).await.unwrap());
        room
    }

    pub async fn ticket(&self, user: &str, room: &Room) -> AdmissionTicket {
        let ticket = AdmissionTicket {
            id: TicketId::generate(),
            user_id: UserId::new(user.to_string()).unwrap(),
            display_name: DisplayName::new(user.to_string()).unwrap(),
            room_id: room.id.clone(),
            family: room.family,
            profile_image_url: None,
            is_winning_fairy: false,
            expires_at: Timestamp::new(NOON + 300_000),
        };
        self.tickets
            .save(&ticket, Duration::from_secs(300))
            .await
            .unwrap();
        ticket
    }
}

/// Next frame pushed to a connection, parsed. Fails the test after a second.
pub(crate) async fn next_frame(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Outbound {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no frame within a second")
        .expect("connection channel closed")
}

pub(crate) async fn next_event(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> serde_json::Value {
    match next_frame(rx).await {
        Outbound::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Whether nothing more arrives within a short while.
pub(crate) async fn is_quiet(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> bool {
    tokio::time::timeout(Duration::from_millis(100), rx.recv())
        .await
        .is_err()
}
