//! Match-room rules: age range, gender filter, team and minimum win rate.

use async_trait::async_trait;

use super::AdmissionStrategy;
use crate::domain::{
    auth::UserInfo,
    entity::{GenderCondition, MatchConditions, Room, RoomFamily},
    error::AdmissionError,
};

/// Stateless: everything it needs is on the room and the caller profile.
/// The win rate is taken from the caller's authenticated profile as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchAdmission;

impl MatchAdmission {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AdmissionStrategy for MatchAdmission {
    fn family(&self) -> RoomFamily {
        RoomFamily::Match
    }

    async fn validate(&self, caller: &UserInfo, room: &Room) -> Result<(), AdmissionError> {
        let open = MatchConditions::open();
        let conditions = room.conditions.as_ref().unwrap_or(&open);

        if conditions.min_age.is_some() || conditions.max_age.is_some() {
            let age = caller.age.ok_or(AdmissionError::MissingCondition("age"))?;
            let too_young = conditions.min_age.is_some_and(|min| age < min);
            let too_old = conditions.max_age.is_some_and(|max| age > max);
            if too_young || too_old {
                return Err(AdmissionError::AgeCondition);
            }
        }

        if let GenderCondition::Only(required) = conditions.gender {
            let gender = caller
                .gender
                .ok_or(AdmissionError::MissingCondition("gender"))?;
            if gender != required {
                return Err(AdmissionError::GenderCondition);
            }
        }

        if let Some(room_team) = room.team_id.as_ref()
            && !conditions.allow_other_teams
        {
            let caller_team = caller
                .team_id
                .as_ref()
                .ok_or(AdmissionError::MissingCondition("teamId"))?;
            if caller_team != room_team {
                return Err(AdmissionError::TeamMismatch);
            }
        }

        if let Some(min_win_rate) = conditions.min_win_rate {
            let win_rate = caller
                .win_rate
                .ok_or(AdmissionError::MissingCondition("winRate"))?;
            if win_rate < min_win_rate {
                return Err(AdmissionError::WinRateCondition);
            }
        }

        Ok(())
    }
}
