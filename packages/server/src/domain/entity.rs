//! Domain entities: rooms, games and their lifecycle rules.

use super::{
    error::{RoomStateError, ValueObjectError},
    value_object::{GameId, RoomId, TeamId, Timestamp, UserId},
};

/// Room family. Selects both the admission strategy and the session policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomFamily {
    /// Ephemeral per-game, per-team room. One session per user.
    Watch,
    /// User-created room with admission conditions. Many sessions per user.
    Match,
}

impl RoomFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watch => "watch",
            Self::Match => "match",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "watch" => Some(Self::Watch),
            "match" => Some(Self::Match),
            _ => None,
        }
    }

    /// Whether a user may only hold one live session at a time.
    pub fn is_single_session(&self) -> bool {
        matches!(self, Self::Watch)
    }
}

/// Lifecycle status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Active,
    Full,
    Closed,
}

/// Event driving the room state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomTransition {
    /// A participant took a seat; `current` is the count afterwards.
    SeatTaken { current: u32 },
    /// A participant left; `current` is the count afterwards.
    SeatReleased { current: u32 },
    /// Owner action or expiry sweep.
    Close,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Full => "FULL",
            Self::Closed => "CLOSED",
        }
    }

    /// Status implied by the stored counters.
    pub fn derive(current: u32, max: u32, closed: bool) -> Self {
        if closed {
            Self::Closed
        } else if current >= max {
            Self::Full
        } else {
            Self::Active
        }
    }

    /// Apply a transition for a room with `max` seats.
    ///
    /// `CLOSED` is terminal: taking a seat fails, releasing or closing again
    /// leaves it closed.
    pub fn on(self, transition: RoomTransition, max: u32) -> Result<Self, RoomStateError> {
        match (self, transition) {
            (Self::Closed, RoomTransition::SeatTaken { .. }) => Err(RoomStateError::Closed),
            (Self::Closed, _) => Ok(Self::Closed),
            (_, RoomTransition::Close) => Ok(Self::Closed),
            (_, RoomTransition::SeatTaken { current })
            | (_, RoomTransition::SeatReleased { current }) => {
                Ok(Self::derive(current, max, false))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "MALE" | "M" => Some(Self::Male),
            "FEMALE" | "F" => Some(Self::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "MALE",
            Self::Female => "FEMALE",
        }
    }
}

/// Gender filter of a match room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenderCondition {
    #[default]
    Any,
    Only(Gender),
}

impl GenderCondition {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ANY" | "ALL" => Some(Self::Any),
            other => Gender::parse(other).map(Self::Only),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::Only(gender) => gender.as_str(),
        }
    }
}

/// Admission conditions declared by a match room.
///
/// `None` means the room does not declare that condition.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConditions {
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub gender: GenderCondition,
    pub allow_other_teams: bool,
    pub min_win_rate: Option<f64>,
}

impl MatchConditions {
    pub fn new(
        min_age: Option<u32>,
        max_age: Option<u32>,
        gender: GenderCondition,
        allow_other_teams: bool,
        min_win_rate: Option<f64>,
    ) -> Result<Self, ValueObjectError> {
        if let (Some(min), Some(max)) = (min_age, max_age)
            && min > max
        {
            return Err(ValueObjectError::OutOfRange(format!(
                "minAge {min} is greater than maxAge {max}"
            )));
        }
        if let Some(rate) = min_win_rate
            && !(0.0..=100.0).contains(&rate)
        {
            return Err(ValueObjectError::OutOfRange(format!(
                "minWinRate {rate} is outside 0..=100"
            )));
        }
        Ok(Self {
            min_age,
            max_age,
            gender,
            allow_other_teams,
            min_win_rate,
        })
    }

    /// Conditions that admit everybody of the room's team.
    pub fn open() -> Self {
        Self {
            min_age: None,
            max_age: None,
            gender: GenderCondition::Any,
            allow_other_teams: false,
            min_win_rate: None,
        }
    }
}

/// A chat destination. Metadata is cluster-shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub family: RoomFamily,
    pub status: RoomStatus,
    pub title: Option<String>,
    pub game_id: Option<GameId>,
    /// Watch: the team the room cheers for. Match: the team condition.
    pub team_id: Option<TeamId>,
    pub owner_id: Option<UserId>,
    pub max_participants: u32,
    pub current_participants: u32,
    pub conditions: Option<MatchConditions>,
    pub created_at: Timestamp,
    pub empty_since: Option<Timestamp>,
}

impl Room {
    /// Watch room of `team_id` for `game`.
    pub fn new_watch(
        game: &Game,
        team_id: TeamId,
        max_participants: u32,
        now: Timestamp,
    ) -> Result<Self, ValueObjectError> {
        validate_capacity(max_participants)?;
        Ok(Self {
            id: RoomId::for_watch(&game.id, &team_id),
            family: RoomFamily::Watch,
            status: RoomStatus::Active,
            title: None,
            game_id: Some(game.id.clone()),
            team_id: Some(team_id),
            owner_id: None,
            max_participants,
            current_participants: 0,
            conditions: None,
            created_at: now,
            empty_since: Some(now),
        })
    }

    /// Match room created by `owner_id`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_match(
        id: RoomId,
        owner_id: UserId,
        title: String,
        game_id: Option<GameId>,
        team_id: Option<TeamId>,
        max_participants: u32,
        conditions: MatchConditions,
        now: Timestamp,
    ) -> Result<Self, ValueObjectError> {
        validate_capacity(max_participants)?;
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(ValueObjectError::Empty("title"));
        }
        Ok(Self {
            id,
            family: RoomFamily::Match,
            status: RoomStatus::Active,
            title: Some(title),
            game_id,
            team_id,
            owner_id: Some(owner_id),
            max_participants,
            current_participants: 0,
            conditions: Some(conditions),
            created_at: now,
            empty_since: Some(now),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.status == RoomStatus::Closed
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.owner_id.as_ref() == Some(user_id)
    }
}

fn validate_capacity(max_participants: u32) -> Result<(), ValueObjectError> {
    if max_participants == 0 {
        return Err(ValueObjectError::OutOfRange(
            "maxParticipants must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Scheduled,
    Live,
    Finished,
    Canceled,
}

impl GameStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "SCHEDULED" => Some(Self::Scheduled),
            "LIVE" | "PLAYING" => Some(Self::Live),
            "FINISHED" | "ENDED" => Some(Self::Finished),
            "CANCELED" | "CANCELLED" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Live => "LIVE",
            Self::Finished => "FINISHED",
            Self::Canceled => "CANCELED",
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self, Self::Finished | Self::Canceled)
    }
}

/// A scheduled game, written by the upstream schedule feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub id: GameId,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub starts_at: Timestamp,
    pub status: GameStatus,
}

impl Game {
    pub fn involves(&self, team_id: &TeamId) -> bool {
        &self.home_team_id == team_id || &self.away_team_id == team_id
    }

    pub fn teams(&self) -> [&TeamId; 2] {
        [&self.home_team_id, &self.away_team_id]
    }
}

/// Outcome of a successful seat change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatChange {
    pub current: u32,
    pub max: u32,
    pub status: RoomStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_becomes_full_when_last_seat_taken() {
        // テスト項目: 定員に達した時点で ACTIVE → FULL に遷移する
        // when (操作):
        let status = RoomStatus::Active.on(RoomTransition::SeatTaken { current: 4 }, 4);

        // then (期待する結果):
        assert_eq!(status, Ok(RoomStatus::Full));
    }

    #[test]
    fn test_full_room_becomes_active_when_someone_leaves() {
        // テスト項目: FULL のルームから退出すると ACTIVE に戻る
        let status = RoomStatus::Full.on(RoomTransition::SeatReleased { current: 3 }, 4);
        assert_eq!(status, Ok(RoomStatus::Active));
    }

    #[test]
    fn test_closed_is_terminal() {
        // テスト項目: CLOSED は終端状態で、入室は拒否され他の遷移でも CLOSED のまま
        // given (前提条件):
        let closed = RoomStatus::Active.on(RoomTransition::Close, 4).unwrap();

        // when (操作):
        let join = closed.on(RoomTransition::SeatTaken { current: 1 }, 4);
        let leave = closed.on(RoomTransition::SeatReleased { current: 0 }, 4);
        let close_again = closed.on(RoomTransition::Close, 4);

        // then (期待する結果):
        assert_eq!(closed, RoomStatus::Closed);
        assert_eq!(join, Err(RoomStateError::Closed));
        assert_eq!(leave, Ok(RoomStatus::Closed));
        assert_eq!(close_again, Ok(RoomStatus::Closed));
    }

    #[test]
    fn test_full_room_can_be_closed() {
        // テスト項目: FULL からも CLOSED に遷移できる
        assert_eq!(
            RoomStatus::Full.on(RoomTransition::Close, 2),
            Ok(RoomStatus::Closed)
        );
    }

    #[test]
    fn test_match_conditions_reject_inverted_age_range() {
        // テスト項目: minAge > maxAge の条件は不正
        let result = MatchConditions::new(Some(40), Some(25), GenderCondition::Any, false, None);
        assert!(matches!(result, Err(ValueObjectError::OutOfRange(_))));
    }

    #[test]
    fn test_match_conditions_reject_win_rate_above_100() {
        // テスト項目: 勝率条件は 0〜100 の範囲でなければならない
        let result =
            MatchConditions::new(None, None, GenderCondition::Any, false, Some(120.0));
        assert!(matches!(result, Err(ValueObjectError::OutOfRange(_))));
    }

    #[test]
    fn test_gender_condition_parse() {
        // テスト項目: 性別条件の文字列表現が解釈できる
        assert_eq!(GenderCondition::parse("any"), Some(GenderCondition::Any));
        assert_eq!(
            GenderCondition::parse("FEMALE"),
            Some(GenderCondition::Only(Gender::Female))
        );
        assert_eq!(GenderCondition::parse("robot"), None);
    }

    #[test]
    fn test_new_match_room_starts_active_and_empty() {
        // テスト項目: 作成直後のマッチルームは ACTIVE・参加者 0 人
        // given (前提条件):
        let owner = UserId::new("owner".to_string()).unwrap();

        // when (操作):
        let room = Room::new_match(
            RoomId::generate_match(),
            owner.clone(),
            "Friday night".to_string(),
            None,
            None,
            4,
            MatchConditions::open(),
            Timestamp::new(1_000),
        )
        .unwrap();

        // then (期待する結果):
        assert_eq!(room.status, RoomStatus::Active);
        assert_eq!(room.current_participants, 0);
        assert!(room.is_owned_by(&owner));
        assert_eq!(room.empty_since, Some(Timestamp::new(1_000)));
    }

    #[test]
    fn test_room_requires_positive_capacity() {
        // テスト項目: 定員 0 のルームは作成できない
        let game = Game {
            id: GameId::new("g1".to_string()).unwrap(),
            home_team_id: TeamId::new("LG".to_string()).unwrap(),
            away_team_id: TeamId::new("KT".to_string()).unwrap(),
            starts_at: Timestamp::new(0),
            status: GameStatus::Scheduled,
        };
        let result = Room::new_watch(&game, game.home_team_id.clone(), 0, Timestamp::new(0));
        assert!(result.is_err());
    }
}
