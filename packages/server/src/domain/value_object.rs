//! Value objects
//!
//! 文字列や数値をそのまま扱わず、生成時に検証された値だけを
//! ドメイン層に流すための型を定義します。

use std::fmt;

use uuid::Uuid;

use super::error::ValueObjectError;

/// Maximum characters of a chat message body.
pub const MAX_MESSAGE_CHARS: usize = 500;

const MAX_ID_CHARS: usize = 128;
const MAX_DISPLAY_NAME_CHARS: usize = 50;

fn validate_identifier(field: &'static str, value: &str) -> Result<(), ValueObjectError> {
    if value.is_empty() {
        return Err(ValueObjectError::Empty(field));
    }
    if value.chars().count() > MAX_ID_CHARS {
        return Err(ValueObjectError::TooLong {
            field,
            max: MAX_ID_CHARS,
        });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValueObjectError::InvalidFormat {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: String) -> Result<Self, ValueObjectError> {
                validate_identifier($field, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a user, issued by the user service.
    UserId,
    "user_id"
);
string_id!(
    /// Identifier of a chat room. Cluster-wide.
    RoomId,
    "room_id"
);
string_id!(
    /// Identifier of a scheduled game.
    GameId,
    "game_id"
);
string_id!(
    /// Identifier of a baseball team.
    TeamId,
    "team_id"
);
string_id!(
    /// Credential handed out by a successful admission.
    TicketId,
    "ticket"
);

impl RoomId {
    /// Deterministic id of the watch room of `team_id` for `game_id`.
    pub fn for_watch(game_id: &GameId, team_id: &TeamId) -> Self {
        Self(format!("watch-{}-{}", game_id.as_str(), team_id.as_str()))
    }

    /// Fresh id for a user-created match room.
    pub fn generate_match() -> Self {
        Self(format!("match-{}", Uuid::new_v4().simple()))
    }
}

impl TicketId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

/// Instance-local identifier of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, ValueObjectError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| ValueObjectError::InvalidFormat {
                field: "session_id",
                value: value.to_string(),
            })
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation id linking an authorization request to its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, ValueObjectError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| ValueObjectError::InvalidFormat {
                field: "request_id",
                value: value.to_string(),
            })
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Nickname shown next to chat messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValueObjectError::Empty("display_name"));
        }
        if trimmed.chars().count() > MAX_DISPLAY_NAME_CHARS {
            return Err(ValueObjectError::TooLong {
                field: "display_name",
                max: MAX_DISPLAY_NAME_CHARS,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Body of a chat message: non-blank, at most [`MAX_MESSAGE_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::Empty("content"));
        }
        if value.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ValueObjectError::TooLong {
                field: "content",
                max: MAX_MESSAGE_CHARS,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Unix timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_rejects_empty_and_symbols() {
        // テスト項目: 空文字や記号を含む RoomId は生成できない
        // when (操作):
        let empty = RoomId::new(String::new());
        let spaced = RoomId::new("room 1".to_string());

        // then (期待する結果):
        assert_eq!(empty, Err(ValueObjectError::Empty("room_id")));
        assert!(matches!(
            spaced,
            Err(ValueObjectError::InvalidFormat { field: "room_id", .. })
        ));
    }

    #[test]
    fn test_watch_room_id_is_deterministic() {
        // テスト項目: 同じ試合・チームからは常に同じ観戦ルーム ID が導出される
        // given (前提条件):
        let game = GameId::new("20261019-LG-KT".to_string()).unwrap();
        let team = TeamId::new("LG".to_string()).unwrap();

        // when (操作):
        let a = RoomId::for_watch(&game, &team);
        let b = RoomId::for_watch(&game, &team);

        // then (期待する結果):
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "watch-20261019-LG-KT-LG");
        assert!(RoomId::new(a.into_string()).is_ok());
    }

    #[test]
    fn test_message_content_accepts_exactly_500_chars() {
        // テスト項目: 500 文字ちょうどは許可され、501 文字は拒否される
        // given (前提条件):
        let at_limit = "あ".repeat(MAX_MESSAGE_CHARS);
        let over_limit = "a".repeat(MAX_MESSAGE_CHARS + 1);

        // when (操作):
        let ok = MessageContent::new(at_limit);
        let too_long = MessageContent::new(over_limit);

        // then (期待する結果):
        assert!(ok.is_ok());
        assert_eq!(
            too_long,
            Err(ValueObjectError::TooLong {
                field: "content",
                max: MAX_MESSAGE_CHARS
            })
        );
    }

    #[test]
    fn test_message_content_rejects_blank() {
        // テスト項目: 空白のみのメッセージは拒否される
        assert_eq!(
            MessageContent::new("   ".to_string()),
            Err(ValueObjectError::Empty("content"))
        );
    }

    #[test]
    fn test_request_id_parse_round_trips_display() {
        // テスト項目: RequestId は文字列表現から復元できる
        // given (前提条件):
        let id = RequestId::generate();

        // when (操作):
        let parsed = RequestId::parse(&id.to_string());

        // then (期待する結果):
        assert_eq!(parsed, Ok(id));
        assert!(RequestId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_display_name_is_trimmed() {
        // テスト項目: 表示名の前後の空白は取り除かれる
        let name = DisplayName::new("  twins_fan  ".to_string()).unwrap();
        assert_eq!(name.as_str(), "twins_fan");
    }
}
