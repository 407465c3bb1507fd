//! Envelope carried on a room's broker channel.

use serde::{Deserialize, Serialize};

use super::websocket::ServerEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrokerEnvelope {
    /// Fan out `event` to every local session of the room except `skip_session`.
    Event {
        event: ServerEvent,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        skip_session: Option<String>,
    },
    /// The room was closed; every instance evicts its local sessions.
    CloseRoom { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::dto::websocket::ErrorFrame;

    #[test]
    fn test_envelope_kinds() {
        // テスト項目: エンベロープは kind で区別され、元の形に復元できる
        // given (前提条件):
        let event = BrokerEnvelope::Event {
            event: ServerEvent::Error(ErrorFrame {
                code: "X".to_string(),
                message: "y".to_string(),
            }),
            skip_session: None,
        };
        let close = BrokerEnvelope::CloseRoom {
            reason: "owner".to_string(),
        };

        // when (操作):
        let event_json = serde_json::to_string(&event).unwrap();
        let close_json = serde_json::to_string(&close).unwrap();

        // then (期待する結果):
        assert!(event_json.contains(r#""kind":"event""#));
        assert!(close_json.contains(r#""kind":"close_room""#));
        assert_eq!(
            serde_json::from_str::<BrokerEnvelope>(&close_json).unwrap(),
            close
        );
    }
}
