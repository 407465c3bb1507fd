//! UseCase: 入室申請（認可ラウンドトリップ → 入室判定 → チケット発行）
//!
//! 1. リクエストの形式を検証する（認可サービスに送る前に弾けるものは弾く）
//! 2. 認可リクエストをキューに送り、相関テーブルをポーリングして結果を待つ
//! 3. ルームファミリーごとの入室ルールを評価し、必要ならルームを作成する
//! 4. 接続用のチケットを発行する

use std::{sync::Arc, time::Duration};

use bleachers_shared::time::Clock;
use serde::Deserialize;

use crate::domain::{
    AdmissionController, AdmissionError, AdmissionTicket, AuthAction, AuthCorrelation,
    AuthError, DisplayName, GameId, GameRepository, GenderCondition, MatchConditions, Room,
    RoomFamily, RoomId, TeamId, TicketId, TicketRepository, Timestamp, UserInfo,
};

use super::error::RequestAdmissionError;

/// Admission call as received from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionCommand {
    pub token: String,
    pub chat_type: RoomFamily,
    pub action: AuthAction,
    pub game_id: Option<GameId>,
    pub room_info: serde_json::Value,
}

/// A granted admission: the room and the ticket to connect with.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub room: Room,
    pub ticket: AdmissionTicket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionSettings {
    /// How long to wait for the authorization result.
    pub auth_timeout: Duration,
    pub ticket_ttl: Duration,
    /// Capacity of watch rooms created on demand.
    pub watch_capacity: u32,
}

/// `roomInfo` of the admission call. Every field is optional on the wire;
/// which ones are required depends on the chat type and action.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RoomInfo {
    room_id: Option<String>,
    team_id: Option<String>,
    title: Option<String>,
    max_participants: Option<u32>,
    allow_other_teams: bool,
    min_age: Option<u32>,
    max_age: Option<u32>,
    gender: Option<String>,
    min_win_rate: Option<f64>,
}

#[derive(Debug)]
struct MatchDraft {
    title: String,
    max_participants: u32,
    /// Game the room is about, when the caller names one.
    game_id: Option<GameId>,
    team_id: Option<TeamId>,
    conditions: MatchConditions,
}

/// Room the caller asks for, resolved from the request alone.
#[derive(Debug)]
enum Target {
    Watch {
        game_id: GameId,
        team_id: Option<TeamId>,
    },
    CreateMatch(MatchDraft),
    JoinMatch(RoomId),
}

fn invalid(message: impl Into<String>) -> RequestAdmissionError {
    RequestAdmissionError::InvalidRequest(message.into())
}

fn parse_target(command: &AdmissionCommand) -> Result<Target, RequestAdmissionError> {
    let info: RoomInfo = if command.room_info.is_null() {
        RoomInfo::default()
    } else {
        serde_json::from_value(command.room_info.clone())
            .map_err(|e| invalid(format!("roomInfo: {e}")))?
    };
    let team_id = info
        .team_id
        .map(TeamId::new)
        .transpose()
        .map_err(|e| invalid(e.to_string()))?;

    match (command.chat_type, command.action) {
        (RoomFamily::Watch, _) => {
            let game_id = command
                .game_id
                .clone()
                .ok_or_else(|| invalid("gameId is required for WATCH"))?;
            Ok(Target::Watch { game_id, team_id })
        }
        (RoomFamily::Match, AuthAction::Join) => {
            let room_id = info
                .room_id
                .ok_or_else(|| invalid("roomInfo.roomId is required to JOIN a MATCH room"))?;
            RoomId::new(room_id)
                .map(Target::JoinMatch)
                .map_err(|e| invalid(e.to_string()))
        }
        (RoomFamily::Match, AuthAction::Create) => {
            let title = info
                .title
                .ok_or_else(|| invalid("roomInfo.title is required"))?;
            let max_participants = info
                .max_participants
                .ok_or_else(|| invalid("roomInfo.maxParticipants is required"))?;
            let gender = match info.gender.as_deref() {
                None => GenderCondition::Any,
                Some(value) => GenderCondition::parse(value)
                    .ok_or_else(|| invalid(format!("unknown gender condition '{value}'")))?,
            };
            let conditions = MatchConditions::new(
                info.min_age,
                info.max_age,
                gender,
                info.allow_other_teams,
                info.min_win_rate,
            )
            .map_err(|e| invalid(e.to_string()))?;
            Ok(Target::CreateMatch(MatchDraft {
                title,
                max_participants,
                game_id: command.game_id.clone(),
                team_id,
                conditions,
            }))
        }
    }
}

/// 入室申請のユースケース
pub struct RequestAdmissionUseCase {
    auth: Arc<dyn AuthCorrelation>,
    controller: Arc<AdmissionController>,
    games: Arc<dyn GameRepository>,
    tickets: Arc<dyn TicketRepository>,
    clock: Arc<dyn Clock>,
    settings: AdmissionSettings,
}

impl RequestAdmissionUseCase {
    pub fn new(
        auth: Arc<dyn AuthCorrelation>,
        controller: Arc<AdmissionController>,
        games: Arc<dyn GameRepository>,
        tickets: Arc<dyn TicketRepository>,
        clock: Arc<dyn Clock>,
        settings: AdmissionSettings,
    ) -> Self {
        Self {
            auth,
            controller,
            games,
            tickets,
            clock,
            settings,
        }
    }

    /// 入室申請を実行
    ///
    /// 認可サービスが時間内に応答しなければ `AuthError::Timeout` を返します。
    /// この場合リクエストは再送しません（呼び出し側で再試行可能）。
    pub async fn execute(
        &self,
        command: AdmissionCommand,
    ) -> Result<Admission, RequestAdmissionError> {
        // 1. 形式チェック
        let target = parse_target(&command)?;

        // 2. 認可ラウンドトリップ
        let request_id = self
            .auth
            .request_auth(
                command.token,
                command.chat_type,
                command.action,
                command.game_id,
                command.room_info,
            )
            .await?;
        let caller = self
            .auth
            .poll_result(request_id, self.settings.auth_timeout)
            .await?
            .into_user_info()?;

        // 3. 入室判定（必要ならルーム作成）
        let room = self.resolve_room(&caller, target).await?;

        // 4. チケット発行
        let ticket = self.issue_ticket(&caller, &room).await?;
        tracing::info!(
            "Admitted '{}' to '{}' ({})",
            caller.user_id,
            room.id,
            room.family.as_str()
        );
        Ok(Admission { room, ticket })
    }

    async fn resolve_room(
        &self,
        caller: &UserInfo,
        target: Target,
    ) -> Result<Room, RequestAdmissionError> {
        let now = Timestamp::new(self.clock.now_millis());
        match target {
            Target::Watch { game_id, team_id } => {
                let team_id = team_id
                    .or_else(|| caller.team_id.clone())
                    .ok_or(AdmissionError::MissingCondition("teamId"))?;
                let game = self
                    .games
                    .find(&game_id)
                    .await?
                    .ok_or(AdmissionError::GameNotFound)?;
                let room = Room::new_watch(&game, team_id, self.settings.watch_capacity, now)
                    .map_err(AdmissionError::from)?;
                // 観戦ルームの ID は決定的なので、作成も参加も同じ経路（冪等）
                Ok(self.controller.create(caller, room).await?)
            }
            Target::CreateMatch(draft) => {
                if let Some(game_id) = draft.game_id.as_ref()
                    && self.games.find(game_id).await?.is_none()
                {
                    return Err(AdmissionError::GameNotFound.into());
                }
                let room = Room::new_match(
                    RoomId::generate_match(),
                    caller.user_id.clone(),
                    draft.title,
                    draft.game_id,
                    draft.team_id.or_else(|| caller.team_id.clone()),
                    draft.max_participants,
                    draft.conditions,
                    now,
                )
                .map_err(|e| invalid(e.to_string()))?;
                Ok(self.controller.create(caller, room).await?)
            }
            Target::JoinMatch(room_id) => {
                let room = self.controller.admit(caller, &room_id).await?;
                if room.family != RoomFamily::Match {
                    return Err(AdmissionError::RoomNotFound.into());
                }
                Ok(room)
            }
        }
    }

    async fn issue_ticket(
        &self,
        caller: &UserInfo,
        room: &Room,
    ) -> Result<AdmissionTicket, RequestAdmissionError> {
        let display_name = DisplayName::new(caller.nickname.clone())
            .map_err(|e| AuthError::Rejected(format!("unusable profile: {e}")))?;
        let ttl_millis = i64::try_from(self.settings.ticket_ttl.as_millis()).unwrap_or(i64::MAX);
        let ticket = AdmissionTicket {
            id: TicketId::generate(),
            user_id: caller.user_id.clone(),
            display_name,
            room_id: room.id.clone(),
            family: room.family,
            profile_image_url: caller.profile_image_url.clone(),
            is_winning_fairy: caller.is_winning_fairy,
            expires_at: Timestamp::new(self.clock.now_millis().saturating_add(ttl_millis)),
        };
        self.tickets.save(&ticket, self.settings.ticket_ttl).await?;
        Ok(ticket)
    }
}
