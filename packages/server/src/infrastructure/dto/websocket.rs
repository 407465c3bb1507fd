//! WebSocket frame DTOs.
//!
//! Outbound frames carry a `type` tag (`message`, `user_join`, `user_leave`,
//! `error`). Inbound frames only need a `content` field.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Message(ChatMessageFrame),
    UserJoin(PresenceFrame),
    UserLeave(PresenceFrame),
    Error(ErrorFrame),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageFrame {
    pub room_id: String,
    pub user_id: String,
    pub display_name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub profile_image_url: Option<String>,
    pub is_winning_fairy: bool,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceFrame {
    pub room_id: String,
    pub user_id: String,
    pub display_name: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorFrame {
    pub code: String,
    pub message: String,
}

/// Frame sent by a client. Frames without `content` (pings, typing
/// indicators and the like) are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl InboundFrame {
    /// Chat text carried by this frame, if it is a chat frame at all.
    pub fn chat_content(self) -> Option<String> {
        match self.kind.as_deref() {
            None | Some("message") => self.content,
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_frame_is_tagged_and_camel_cased() {
        // テスト項目: message フレームは type タグと camelCase のフィールドを持つ
        // given (前提条件):
        let event = ServerEvent::Message(ChatMessageFrame {
            room_id: "match-1".to_string(),
            user_id: "u1".to_string(),
            display_name: "Kim".to_string(),
            content: "hi".to_string(),
            profile_image_url: None,
            is_winning_fairy: true,
            timestamp: 42,
        });

        // when (操作):
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        // then (期待する結果):
        assert_eq!(json["type"], "message");
        assert_eq!(json["roomId"], "match-1");
        assert_eq!(json["isWinningFairy"], true);
        assert!(json.get("profileImageUrl").is_none());
    }

    #[test]
    fn test_presence_frames_use_snake_case_tags() {
        // テスト項目: 入退室フレームの type は user_join / user_leave
        let frame = PresenceFrame {
            room_id: "r".to_string(),
            user_id: "u".to_string(),
            display_name: "n".to_string(),
            timestamp: 1,
        };

        let join = serde_json::to_value(ServerEvent::UserJoin(frame.clone())).unwrap();
        let leave = serde_json::to_value(ServerEvent::UserLeave(frame)).unwrap();

        assert_eq!(join["type"], "user_join");
        assert_eq!(leave["type"], "user_leave");
    }

    #[test]
    fn test_inbound_frame_variants() {
        // テスト項目: content だけのフレームはチャット、他の type のフレームは無視される
        let plain: InboundFrame = serde_json::from_str(r#"{"content":"hello"}"#).unwrap();
        let typed: InboundFrame =
            serde_json::from_str(r#"{"type":"message","content":"hey"}"#).unwrap();
        let ping: InboundFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        let typing: InboundFrame =
            serde_json::from_str(r#"{"type":"typing","content":"..."}"#).unwrap();

        assert_eq!(plain.chat_content(), Some("hello".to_string()));
        assert_eq!(typed.chat_content(), Some("hey".to_string()));
        assert_eq!(ping.chat_content(), None);
        assert_eq!(typing.chat_content(), None);
    }
}
