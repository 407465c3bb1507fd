//! Composition root of one chat instance.
//!
//! 依存関係を次の順で組み立てます。
//!
//! 1. Repository（共有ストア上のルーム・試合・チケット）
//! 2. 入室コントローラー（観戦 / マッチの戦略）
//! 3. インスタンス内のコンポーネント（Registry, Broadcaster, 監視）
//! 4. 認証の往復（結果コンシューマ、必要ならスタブ認証サービス）
//! 5. 試合スケジュールの購読とルームの掃除
//! 6. UseCase と Server
//!
//! 複数のインスタンスは共有ストア・ブローカー・キューだけを介して協調します。

use std::{future::Future, path::Path, sync::Arc};

use axum::Router;
use bleachers_shared::time::Clock;
use thiserror::Error;
use tokio::{net::TcpListener, task::JoinHandle};

use crate::{
    config::ServerConfig,
    domain::{
        AdmissionController, BrokerInbox, Game, KeyValueStore, MatchAdmission, MessageBroker,
        MessageQueue, QueueError, WatchAdmission,
        queue::{
            TOPIC_AUTH_REQUEST_MATCH, TOPIC_AUTH_REQUEST_WATCH, TOPIC_AUTH_RESULT,
            TOPIC_GAME_SCHEDULE,
        },
        session::CLOSE_CODE_GOING_AWAY,
    },
    infrastructure::{
        auth::{AuthCorrelator, AuthResultConsumer, StubAuthorizationService, StubProfileError},
        broadcaster::Broadcaster,
        broker::InMemoryBrokerHub,
        dto::queue::GameScheduleMessage,
        queue::InMemoryMessageQueue,
        registry::ConnectionRegistry,
        repository::{KvGameRepository, KvRoomRepository, KvTicketRepository},
        store::InMemoryKeyValueStore,
        traffic::TrafficSpikeDetector,
    },
    ui::{
        Server,
        consumer::{consume_game_schedule, sweep_rooms},
        state::AppState,
    },
    usecase::{
        CloseRoomUseCase, ConnectParticipantUseCase, DisconnectParticipantUseCase,
        ExpireRoomsUseCase, ExpiryPolicy, GetRoomDetailUseCase, OpenWatchRoomsUseCase,
        RequestAdmissionUseCase, SendMessageUseCase,
    },
};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to read '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    StubProfiles(#[from] StubProfileError),
    #[error("invalid seed games: {0}")]
    SeedGames(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "redis-backend")]
    #[error("redis backend: {0}")]
    Redis(String),
}

/// Connections of one instance to the cluster-shared collaborators.
pub struct Backends {
    pub store: Arc<dyn KeyValueStore>,
    pub queue: Arc<dyn MessageQueue>,
    pub broker: Arc<dyn MessageBroker>,
    pub inbox: BrokerInbox,
}

impl Backends {
    /// Connect to Redis for the store, the broker and the queue.
    #[cfg(feature = "redis-backend")]
    pub async fn redis(url: &str) -> Result<Self, NodeError> {
        use crate::infrastructure::{
            broker::RedisBroker, queue::RedisMessageQueue, store::RedisKeyValueStore,
        };

        let client = redis::Client::open(url).map_err(|e| NodeError::Redis(e.to_string()))?;
        let store = RedisKeyValueStore::connect(&client)
            .await
            .map_err(|e| NodeError::Redis(e.to_string()))?;
        let queue = RedisMessageQueue::connect(&client).await?;
        let (broker, inbox) = RedisBroker::connect(&client)
            .await
            .map_err(|e| NodeError::Redis(e.to_string()))?;
        Ok(Self {
            store: Arc::new(store),
            queue: Arc::new(queue),
            broker: Arc::new(broker),
            inbox,
        })
    }
}

/// In-process stand-in for the shared store, broker and queue.
/// Every node attached to the same cluster sees the same state.
#[derive(Clone)]
pub struct InMemoryCluster {
    pub store: Arc<InMemoryKeyValueStore>,
    pub queue: Arc<InMemoryMessageQueue>,
    pub hub: Arc<InMemoryBrokerHub>,
}

impl InMemoryCluster {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(InMemoryKeyValueStore::new(clock)),
            queue: InMemoryMessageQueue::new(),
            hub: InMemoryBrokerHub::new(),
        }
    }

    /// Attach one more node.
    pub fn backends(&self) -> Backends {
        let (broker, inbox) = self.hub.connect();
        Backends {
            store: self.store.clone(),
            queue: self.queue.clone(),
            broker: Arc::new(broker),
            inbox,
        }
    }
}

/// One chat server instance with its background tasks.
pub struct ChatNode {
    instance_id: String,
    server: Server,
    registry: Arc<ConnectionRegistry>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChatNode {
    /// Wire every component and start the background tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn build(
        config: ServerConfig,
        backends: Backends,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        let Backends {
            store,
            queue,
            broker,
            inbox,
        } = backends;
        let mut tasks = Vec::new();

        // 1. Repository
        let rooms = Arc::new(KvRoomRepository::new(store.clone(), config.room_ttl));
        let games = Arc::new(KvGameRepository::new(store.clone(), config.game_ttl));
        let tickets = Arc::new(KvTicketRepository::new(store.clone()));

        // 2. 入室コントローラー
        let controller = Arc::new(AdmissionController::new(
            rooms.clone(),
            Arc::new(WatchAdmission::new(games.clone(), clock.clone(), config.zone)),
            Arc::new(MatchAdmission::new()),
        ));

        // 3. Registry / Broadcaster / 監視
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(broker, registry.clone()));
        tasks.push(tokio::spawn(broadcaster.clone().run(inbox)));
        let traffic = Arc::new(TrafficSpikeDetector::new(
            store.clone(),
            queue.clone(),
            rooms.clone(),
            clock.clone(),
            config.spike,
        ));

        // 4. 認証の往復
        let correlator = Arc::new(AuthCorrelator::new(
            queue.clone(),
            store.clone(),
            config.auth_poll_interval,
        ));
        let result_consumer = Arc::new(AuthResultConsumer::new(
            store.clone(),
            config.auth_result_ttl,
        ));
        let results = queue.subscribe(TOPIC_AUTH_RESULT).await?;
        tasks.push(tokio::spawn(result_consumer.run(results)));

        if let Some(path) = config.stub_profiles.as_deref() {
            let profiles = StubAuthorizationService::parse_profiles(&read_file(path).await?)?;
            tracing::info!("Stub authorization enabled with {} profile(s)", profiles.len());
            let stub = Arc::new(StubAuthorizationService::new(queue.clone(), profiles));
            for topic in [TOPIC_AUTH_REQUEST_WATCH, TOPIC_AUTH_REQUEST_MATCH] {
                let requests = queue.subscribe(topic).await?;
                tasks.push(tokio::spawn(stub.clone().run(requests)));
            }
        }

        // 5. 試合スケジュールと掃除
        let open_watch_rooms = Arc::new(OpenWatchRoomsUseCase::new(
            games.clone(),
            controller.clone(),
            clock.clone(),
            config.watch_capacity,
        ));
        if let Some(path) = config.seed_games.as_deref() {
            let seeded = seed_games(&open_watch_rooms, &read_file(path).await?).await?;
            tracing::info!("Seeded {} game(s)", seeded);
        }
        let schedule = queue.subscribe(TOPIC_GAME_SCHEDULE).await?;
        tasks.push(tokio::spawn(consume_game_schedule(open_watch_rooms, schedule)));

        let expire_rooms = Arc::new(ExpireRoomsUseCase::new(
            rooms.clone(),
            games.clone(),
            controller.clone(),
            broadcaster.clone(),
            clock.clone(),
            ExpiryPolicy {
                empty_room_grace: config.empty_room_grace,
                zone: config.zone,
            },
        ));
        tasks.push(tokio::spawn(sweep_rooms(expire_rooms, config.sweep_interval)));

        // 6. UseCase と Server
        let state = AppState {
            request_admission_usecase: Arc::new(RequestAdmissionUseCase::new(
                correlator,
                controller.clone(),
                games,
                tickets.clone(),
                clock.clone(),
                config.admission_settings(),
            )),
            connect_participant_usecase: Arc::new(ConnectParticipantUseCase::new(
                tickets.clone(),
                controller.clone(),
                registry.clone(),
                broadcaster.clone(),
                clock.clone(),
            )),
            disconnect_participant_usecase: Arc::new(DisconnectParticipantUseCase::new(
                controller.clone(),
                registry.clone(),
                broadcaster.clone(),
                clock.clone(),
            )),
            send_message_usecase: Arc::new(SendMessageUseCase::new(
                broadcaster.clone(),
                traffic,
                clock.clone(),
            )),
            close_room_usecase: Arc::new(CloseRoomUseCase::new(
                rooms.clone(),
                tickets,
                controller,
                broadcaster,
                clock,
            )),
            get_room_detail_usecase: Arc::new(GetRoomDetailUseCase::new(rooms, registry.clone())),
            registry: registry.clone(),
            instance_id: config.instance_id.clone(),
        };

        Ok(Self {
            instance_id: config.instance_id,
            server: Server::new(state),
            registry,
            tasks,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn router(&self) -> Router {
        self.server.router()
    }

    /// Serve until `shutdown` resolves, then close every local session and
    /// stop the background tasks.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), NodeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            instance_id,
            server,
            registry,
            tasks,
        } = self;

        // 接続中のセッションを閉じないと WebSocket が残り続ける
        let closing = registry.clone();
        let shutdown = async move {
            shutdown.await;
            let closed = closing
                .shutdown(CLOSE_CODE_GOING_AWAY, "server shutting down")
                .await;
            tracing::info!("Closed {} session(s)", closed.len());
        };
        let served = server.run(listener, shutdown).await;

        for task in tasks {
            task.abort();
        }
        tracing::info!("Instance '{}' stopped", instance_id);
        served?;
        Ok(())
    }
}

async fn read_file(path: &Path) -> Result<String, NodeError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| NodeError::ReadFile {
            path: path.display().to_string(),
            source,
        })
}

/// Apply a JSON array of game-schedule records. Returns how many were applied.
async fn seed_games(usecase: &OpenWatchRoomsUseCase, json: &str) -> Result<usize, NodeError> {
    let messages: Vec<GameScheduleMessage> =
        serde_json::from_str(json).map_err(|e| NodeError::SeedGames(e.to_string()))?;
    let count = messages.len();
    for message in messages {
        let game = Game::try_from(message).map_err(|e| NodeError::SeedGames(e.to_string()))?;
        usecase
            .execute(game)
            .await
            .map_err(|e| NodeError::SeedGames(e.to_string()))?;
    }
    Ok(count)
}
