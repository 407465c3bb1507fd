//! RoomRepository on the shared key-value store.
//!
//! ルームは `chat:room:{id}` のハッシュとして保存し、開いているルームの ID を
//! `chat:rooms` セットで索引します。ステータスは保存しません。参加者数と
//! `closed_at` から毎回導出します。

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    GameId, GenderCondition, KeyValueStore, MatchConditions, RepositoryError, Room, RoomFamily,
    RoomId, RoomRepository, RoomStatus, SeatChange, SeatOutcome, TeamId, Timestamp, UserId,
};

const ROOM_KEY_PREFIX: &str = "chat:room:";
const ROOM_INDEX_KEY: &str = "chat:rooms";
/// How long a closed room stays readable, so late joiners see ROOM_CLOSED.
const CLOSED_RETENTION: Duration = Duration::from_secs(60 * 60);

const F_FAMILY: &str = "family";
const F_TITLE: &str = "title";
const F_GAME: &str = "gameId";
const F_TEAM: &str = "teamId";
const F_OWNER: &str = "ownerId";
const F_MAX: &str = "maxParticipants";
const F_CURRENT: &str = "currentParticipants";
const F_CONDITIONS: &str = "conditions";
const F_CREATED: &str = "createdAt";
const F_EMPTY_SINCE: &str = "emptySince";
const F_CLOSED_AT: &str = "closedAt";

fn room_key(id: &RoomId) -> String {
    format!("{ROOM_KEY_PREFIX}{}", id.as_str())
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredConditions {
    min_age: Option<u32>,
    max_age: Option<u32>,
    gender: String,
    allow_other_teams: bool,
    min_win_rate: Option<f64>,
}

fn corrupted(id: &str, what: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Corrupted(format!("room '{id}': {what}"))
}

fn encode(room: &Room) -> Result<Vec<(&'static str, String)>, RepositoryError> {
    let mut fields = vec![
        (F_FAMILY, room.family.as_str().to_string()),
        (F_MAX, room.max_participants.to_string()),
        (F_CURRENT, room.current_participants.to_string()),
        (F_CREATED, room.created_at.value().to_string()),
    ];
    if let Some(title) = &room.title {
        fields.push((F_TITLE, title.clone()));
    }
    if let Some(game_id) = &room.game_id {
        fields.push((F_GAME, game_id.as_str().to_string()));
    }
    if let Some(team_id) = &room.team_id {
        fields.push((F_TEAM, team_id.as_str().to_string()));
    }
    if let Some(owner_id) = &room.owner_id {
        fields.push((F_OWNER, owner_id.as_str().to_string()));
    }
    if let Some(empty_since) = room.empty_since {
        fields.push((F_EMPTY_SINCE, empty_since.value().to_string()));
    }
    if let Some(conditions) = &room.conditions {
        let stored = StoredConditions {
            min_age: conditions.min_age,
            max_age: conditions.max_age,
            gender: conditions.gender.as_str().to_string(),
            allow_other_teams: conditions.allow_other_teams,
            min_win_rate: conditions.min_win_rate,
        };
        let json = serde_json::to_string(&stored)
            .map_err(|e| corrupted(room.id.as_str(), e))?;
        fields.push((F_CONDITIONS, json));
    }
    Ok(fields)
}

fn decode(id: &RoomId, fields: &HashMap<String, String>) -> Result<Room, RepositoryError> {
    let raw = id.as_str();
    let text = |name: &str| fields.get(name).cloned();
    let number = |name: &'static str| -> Result<Option<i64>, RepositoryError> {
        fields
            .get(name)
            .map(|v| v.parse::<i64>().map_err(|e| corrupted(raw, format!("{name}: {e}"))))
            .transpose()
    };

    let family = text(F_FAMILY)
        .as_deref()
        .and_then(RoomFamily::parse)
        .ok_or_else(|| corrupted(raw, "missing family"))?;
    let max = number(F_MAX)?.ok_or_else(|| corrupted(raw, "missing capacity"))?;
    let current = number(F_CURRENT)?.unwrap_or(0);
    let max_participants =
        u32::try_from(max).map_err(|_| corrupted(raw, "capacity out of range"))?;
    let current_participants =
        u32::try_from(current).map_err(|_| corrupted(raw, "participant count out of range"))?;
    let closed = fields.contains_key(F_CLOSED_AT);

    let conditions = match fields.get(F_CONDITIONS) {
        None => None,
        Some(json) => {
            let stored: StoredConditions =
                serde_json::from_str(json).map_err(|e| corrupted(raw, e))?;
            let gender = GenderCondition::parse(&stored.gender)
                .ok_or_else(|| corrupted(raw, "unknown gender condition"))?;
            Some(
                MatchConditions::new(
                    stored.min_age,
                    stored.max_age,
                    gender,
                    stored.allow_other_teams,
                    stored.min_win_rate,
                )
                .map_err(|e| corrupted(raw, e))?,
            )
        }
    };

    Ok(Room {
        id: id.clone(),
        family,
        status: RoomStatus::derive(current_participants, max_participants, closed),
        title: text(F_TITLE),
        game_id: text(F_GAME)
            .map(GameId::new)
            .transpose()
            .map_err(|e| corrupted(raw, e))?,
        team_id: text(F_TEAM)
            .map(TeamId::new)
            .transpose()
            .map_err(|e| corrupted(raw, e))?,
        owner_id: text(F_OWNER)
            .map(UserId::new)
            .transpose()
            .map_err(|e| corrupted(raw, e))?,
        max_participants,
        current_participants,
        conditions,
        created_at: Timestamp::new(number(F_CREATED)?.unwrap_or(0)),
        empty_since: number(F_EMPTY_SINCE)?.map(Timestamp::new),
    })
}

pub struct KvRoomRepository {
    store: Arc<dyn KeyValueStore>,
    room_ttl: Duration,
}

impl KvRoomRepository {
    /// `room_ttl` bounds how long an abandoned room lingers in the store.
    pub fn new(store: Arc<dyn KeyValueStore>, room_ttl: Duration) -> Self {
        Self { store, room_ttl }
    }

    async fn load(&self, id: &RoomId) -> Result<Option<Room>, RepositoryError> {
        let fields = self.store.hash_get_all(&room_key(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode(id, &fields).map(Some)
    }

    fn seat_change(room: &Room, current: i64) -> SeatChange {
        let current = u32::try_from(current).unwrap_or(0);
        SeatChange {
            current,
            max: room.max_participants,
            status: RoomStatus::derive(current, room.max_participants, room.is_closed()),
        }
    }
}

#[async_trait]
impl RoomRepository for KvRoomRepository {
    async fn insert(&self, room: &Room) -> Result<bool, RepositoryError> {
        let fields = encode(room)?;
        let created = self
            .store
            .hash_create(&room_key(&room.id), &fields, Some(self.room_ttl))
            .await?;
        if created {
            self.store.set_add(ROOM_INDEX_KEY, room.id.as_str()).await?;
        }
        Ok(created)
    }

    async fn find(&self, id: &RoomId) -> Result<Option<Room>, RepositoryError> {
        self.load(id).await
    }

    async fn occupy_seat(
        &self,
        id: &RoomId,
        _now: Timestamp,
    ) -> Result<SeatOutcome, RepositoryError> {
        let Some(room) = self.load(id).await? else {
            return Ok(SeatOutcome::NotFound);
        };
        if room.is_closed() {
            return Ok(SeatOutcome::Closed);
        }

        let key = room_key(id);
        let taken = self
            .store
            .hash_increment_within(&key, F_CURRENT, 1, 0, i64::from(room.max_participants))
            .await?;
        let Some(current) = taken else {
            // 範囲外か、読み込み後にキーが消えた
            return Ok(match self.load(id).await? {
                None => SeatOutcome::NotFound,
                Some(room) if room.is_closed() => SeatOutcome::Closed,
                Some(_) => SeatOutcome::Full,
            });
        };
        if current == 1 {
            self.store.hash_delete(&key, F_EMPTY_SINCE).await?;
        }
        Ok(SeatOutcome::Taken(Self::seat_change(&room, current)))
    }

    async fn release_seat(
        &self,
        id: &RoomId,
        now: Timestamp,
    ) -> Result<Option<SeatChange>, RepositoryError> {
        let key = room_key(id);
        let released = self
            .store
            .hash_increment_within(&key, F_CURRENT, -1, 0, i64::MAX)
            .await?;
        let Some(current) = released else {
            return Ok(None);
        };
        if current == 0 {
            self.store
                .hash_set(&key, &[(F_EMPTY_SINCE, now.value().to_string())])
                .await?;
        }
        Ok(self
            .load(id)
            .await?
            .map(|room| Self::seat_change(&room, current)))
    }

    async fn mark_closed(&self, id: &RoomId, now: Timestamp) -> Result<bool, RepositoryError> {
        let Some(room) = self.load(id).await? else {
            return Ok(false);
        };
        if room.is_closed() {
            return Ok(false);
        }
        let key = room_key(id);
        self.store
            .hash_set(&key, &[(F_CLOSED_AT, now.value().to_string())])
            .await?;
        self.store.set_remove(ROOM_INDEX_KEY, id.as_str()).await?;
        self.store.expire(&key, CLOSED_RETENTION).await?;
        Ok(true)
    }

    async fn list_open(&self) -> Result<Vec<RoomId>, RepositoryError> {
        let mut open = Vec::new();
        for member in self.store.set_members(ROOM_INDEX_KEY).await? {
            let Ok(id) = RoomId::new(member.clone()) else {
                self.store.set_remove(ROOM_INDEX_KEY, &member).await?;
                continue;
            };
            if self.store.hash_get_all(&room_key(&id)).await?.is_empty() {
                // TTL で消えたルームを索引からも外す
                self.store.set_remove(ROOM_INDEX_KEY, &member).await?;
                continue;
            }
            open.push(id);
        }
        Ok(open)
    }
}
