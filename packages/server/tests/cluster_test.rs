//! Integration tests: two chat instances over one shared in-memory cluster.
//!
//! Each test starts its own cluster, so tests do not interfere with each other.

use std::{path::PathBuf, sync::Arc, time::Duration};

use bleachers_server::{
    config::ServerConfig,
    domain::{Game, GameId, GameRepository, GameStatus, TeamId, Timestamp},
    infrastructure::repository::KvGameRepository,
    node::{ChatNode, InMemoryCluster},
};
use bleachers_shared::time::{Clock, SystemClock, current_timestamp};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const GAME_ID: &str = "20261019-LG-KT";
const PROFILES: &str = include_str!("../fixtures/profiles.json");

/// One running instance.
struct TestNode {
    http: String,
    ws: String,
}

/// Cluster of two instances sharing a store, a broker and a queue.
struct TestCluster {
    cluster: InMemoryCluster,
    nodes: Vec<TestNode>,
    client: reqwest::Client,
}

fn profiles_file() -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "bleachers-profiles-{}.json",
        uuid::Uuid::new_v4().simple()
    ));
    std::fs::write(&path, PROFILES).unwrap();
    path
}

impl TestCluster {
    async fn start() -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cluster = InMemoryCluster::new(clock.clone());
        let profiles = profiles_file();

        let mut nodes = Vec::new();
        for name in ["chat-a", "chat-b"] {
            let config = ServerConfig {
                instance_id: name.to_string(),
                auth_timeout: Duration::from_secs(2),
                auth_poll_interval: Duration::from_millis(20),
                stub_profiles: Some(profiles.clone()),
                ..ServerConfig::default()
            };
            let node = ChatNode::build(config, cluster.backends(), clock.clone())
                .await
                .unwrap();
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(node.serve(listener, std::future::pending()));
            nodes.push(TestNode {
                http: format!("http://{addr}"),
                ws: format!("ws://{addr}"),
            });
        }

        Self {
            cluster,
            nodes,
            client: reqwest::Client::new(),
        }
    }

    /// Schedule today's LG vs KT game.
    async fn schedule_game(&self) {
        let games = KvGameRepository::new(self.cluster.store.clone(), Duration::from_secs(3600));
        let game = Game {
            id: GameId::new(GAME_ID.to_string()).unwrap(),
            home_team_id: TeamId::new("LG".to_string()).unwrap(),
            away_team_id: TeamId::new("KT".to_string()).unwrap(),
            starts_at: Timestamp::new(current_timestamp()),
            status: GameStatus::Live,
        };
        games.save(&game).await.unwrap();
    }

    async fn admit(&self, node: usize, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(format!("{}/api/chat/admission", self.nodes[node].http))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn admit_watch(&self, node: usize, token: &str) -> Value {
        let (status, body) = self
            .admit(
                node,
                json!({"token": token, "chatType": "WATCH", "action": "JOIN", "gameId": GAME_ID}),
            )
            .await;
        assert_eq!(status, 200, "admission failed: {body}");
        body
    }

    async fn connect(&self, node: usize, descriptor: &Value) -> Ws {
        let endpoint = descriptor["endpoint"].as_str().unwrap();
        let (ws, _) = connect_async(format!("{}{}", self.nodes[node].ws, endpoint))
            .await
            .unwrap();
        ws
    }
}

/// Next text frame, parsed. Control frames are skipped.
async fn next_event(ws: &mut Ws) -> Value {
    loop {
        match next_message(ws).await {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

async fn next_message(ws: &mut Ws) -> Message {
    tokio::time::timeout(Duration::from_secs(3), ws.next())
        .await
        .expect("no frame within 3 seconds")
        .expect("stream ended")
        .expect("websocket error")
}

/// Close code of the next close frame.
async fn next_close_code(ws: &mut Ws) -> u16 {
    loop {
        if let Message::Close(frame) = next_message(ws).await {
            return frame.map(|f| u16::from(f.code)).unwrap_or_default();
        }
    }
}

async fn send_chat(ws: &mut Ws, content: &str) {
    let frame = json!({"content": content}).to_string();
    ws.send(Message::Text(frame.into())).await.unwrap();
}

#[tokio::test]
async fn test_watch_chat_fans_out_across_instances() {
    // テスト項目: 別々のインスタンスに接続した同じ観戦ルームの参加者に、入室とメッセージが届く
    // given (前提条件):
    let cluster = TestCluster::start().await;
    cluster.schedule_game().await;
    let first = cluster.admit_watch(0, "token-lg-fan").await;
    let second = cluster.admit_watch(1, "token-lg-fan-2").await;
    assert_eq!(first["roomId"], format!("watch-{GAME_ID}-LG"));
    assert_eq!(first["roomId"], second["roomId"]);
    let mut ws_a = cluster.connect(0, &first).await;
    let mut ws_b = cluster.connect(1, &second).await;

    // when (操作):
    let joined = next_event(&mut ws_a).await;
    send_chat(&mut ws_b, "Let's go Twins!").await;

    // then (期待する結果):
    assert_eq!(joined["type"], "user_join");
    assert_eq!(joined["userId"], "user-lg-2");
    for ws in [&mut ws_a, &mut ws_b] {
        let event = next_event(ws).await;
        assert_eq!(event["type"], "message");
        assert_eq!(event["content"], "Let's go Twins!");
        assert_eq!(event["displayName"], "JamsilNights");
    }
}

#[tokio::test]
async fn test_watch_second_connection_evicts_first() {
    // テスト項目: 観戦ルームで同じユーザーが再接続すると、古い接続が 4000 で閉じられる
    // given (前提条件):
    let cluster = TestCluster::start().await;
    cluster.schedule_game().await;
    let descriptor = cluster.admit_watch(0, "token-lg-fan").await;
    let mut old = cluster.connect(0, &descriptor).await;

    // when (操作):
    let mut new = cluster.connect(0, &descriptor).await;

    // then (期待する結果):
    assert_eq!(next_close_code(&mut old).await, 4000);
    send_chat(&mut new, "still here").await;
    assert_eq!(next_event(&mut new).await["content"], "still here");
}

#[tokio::test]
async fn test_other_team_fan_is_rejected_from_watch_room() {
    // テスト項目: 相手チームのファンが LG の観戦ルームを指定すると 403 TEAM_MISMATCH
    let cluster = TestCluster::start().await;
    cluster.schedule_game().await;

    let (status, body) = cluster
        .admit(
            0,
            json!({
                "token": "token-kt-fan",
                "chatType": "WATCH",
                "action": "JOIN",
                "gameId": GAME_ID,
                "roomInfo": {"teamId": "LG"}
            }),
        )
        .await;

    assert_eq!(status, 403);
    assert_eq!(body["errorCode"], "TEAM_MISMATCH");
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    // テスト項目: 認証サービスが拒否したトークンは 401 AUTH_REJECTED
    let cluster = TestCluster::start().await;
    cluster.schedule_game().await;

    let (status, body) = cluster
        .admit(
            1,
            json!({"token": "nope", "chatType": "WATCH", "action": "JOIN", "gameId": GAME_ID}),
        )
        .await;

    assert_eq!(status, 401);
    assert_eq!(body["errorCode"], "AUTH_REJECTED");
}

#[tokio::test]
async fn test_match_room_multi_session_and_capacity() {
    // テスト項目: マッチルームでは同じユーザーの複数接続が共存し、定員に達すると join が 409 になる
    // given (前提条件):
    let cluster = TestCluster::start().await;
    let (status, created) = cluster
        .admit(
            0,
            json!({
                "token": "token-lg-fan",
                "chatType": "MATCH",
                "action": "CREATE",
                "roomInfo": {"title": "Jamsil after party", "maxParticipants": 2}
            }),
        )
        .await;
    assert_eq!(status, 200, "create failed: {created}");
    let room_id = created["roomId"].as_str().unwrap().to_string();

    // when (操作):
    let mut phone = cluster.connect(0, &created).await;
    let mut laptop = cluster.connect(0, &created).await;
    let (join_status, join_body) = cluster
        .admit(
            1,
            json!({
                "token": "token-lg-fan-2",
                "chatType": "MATCH",
                "action": "JOIN",
                "roomInfo": {"roomId": room_id}
            }),
        )
        .await;

    // then (期待する結果):
    assert_eq!(join_status, 409);
    assert_eq!(join_body["errorCode"], "ROOM_FULL");

    let detail: Value = cluster
        .client
        .get(format!("{}/api/chat/rooms/{}", cluster.nodes[0].http, room_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["status"], "FULL");
    assert_eq!(detail["currentParticipants"], 2);
    assert_eq!(detail["localSessions"], 2);

    send_chat(&mut phone, "both devices").await;
    assert_eq!(next_event(&mut phone).await["content"], "both devices");
    assert_eq!(next_event(&mut laptop).await["content"], "both devices");
}

#[tokio::test]
async fn test_oversized_message_is_answered_with_error_frame() {
    // テスト項目: 500 文字を超えるメッセージは error フレームで拒否され、配信されない
    // given (前提条件):
    let cluster = TestCluster::start().await;
    cluster.schedule_game().await;
    let descriptor = cluster.admit_watch(0, "token-lg-fan").await;
    let mut ws = cluster.connect(0, &descriptor).await;

    // when (操作):
    send_chat(&mut ws, &"a".repeat(501)).await;
    send_chat(&mut ws, &"b".repeat(500)).await;

    // then (期待する結果):
    let error = next_event(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "INVALID_MESSAGE");
    let delivered = next_event(&mut ws).await;
    assert_eq!(delivered["type"], "message");
    assert_eq!(delivered["content"].as_str().unwrap().len(), 500);
}

#[tokio::test]
async fn test_owner_close_disconnects_participants_on_every_instance() {
    // テスト項目: オーナーが別インスタンスからルームを閉じると、参加者に 4001 の close が届く
    // given (前提条件):
    let cluster = TestCluster::start().await;
    let (_, created) = cluster
        .admit(
            0,
            json!({
                "token": "token-lg-fan",
                "chatType": "MATCH",
                "action": "CREATE",
                "roomInfo": {"title": "Post game", "maxParticipants": 4}
            }),
        )
        .await;
    let room_id = created["roomId"].as_str().unwrap().to_string();
    let (_, joined) = cluster
        .admit(
            0,
            json!({
                "token": "token-lg-fan-2",
                "chatType": "MATCH",
                "action": "JOIN",
                "roomInfo": {"roomId": room_id}
            }),
        )
        .await;
    let mut guest = cluster.connect(0, &joined).await;

    // when (操作):
    let response: Value = cluster
        .client
        .post(format!(
            "{}/api/chat/rooms/{}/close",
            cluster.nodes[1].http, room_id
        ))
        .json(&json!({"ticket": created["ticket"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(response["closed"], true);
    assert_eq!(next_close_code(&mut guest).await, 4001);
}

#[tokio::test]
async fn test_invalid_ticket_cannot_connect() {
    // テスト項目: 不明なチケットでの接続は 401 で拒否される
    let cluster = TestCluster::start().await;
    let url = format!(
        "{}/ws/chat/watch-{GAME_ID}-LG?ticket=deadbeef",
        cluster.nodes[0].ws
    );

    let result = connect_async(url).await;

    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 401);
        }
        other => panic!("expected an HTTP rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_health_reports_instance_and_connections() {
    // テスト項目: ヘルスチェックがインスタンス名と接続数を返す
    let cluster = TestCluster::start().await;
    cluster.schedule_game().await;
    let descriptor = cluster.admit_watch(1, "token-lg-fan").await;
    let _ws = cluster.connect(1, &descriptor).await;

    let health: Value = cluster
        .client
        .get(format!("{}/api/health", cluster.nodes[1].http))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(health["status"], "ok");
    assert_eq!(health["instanceId"], "chat-b");
    assert_eq!(health["connections"], 1);
}
