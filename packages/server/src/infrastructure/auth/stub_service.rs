//! Development authorization responder.
//!
//! 外部のユーザーサービスの代わりに `auth-request.*` を購読し、固定の
//! トークン → プロフィール表から `auth-result` を返します。単一ノードでの
//! 動作確認とテスト用です。

use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;

use crate::{
    domain::{
        AuthRequest, AuthResult, MessageQueue, QueueError, QueueSubscription, UserInfo,
        queue::TOPIC_AUTH_RESULT,
    },
    infrastructure::dto::{
        conversion::DtoError,
        queue::{AuthRequestMessage, AuthResultMessage, UserInfoMessage},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum StubProfileError {
    #[error("profile file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("profile for token '{token}' is invalid: {source}")]
    Profile { token: String, source: DtoError },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StubProfileEntry {
    token: String,
    user_info: UserInfoMessage,
}

pub struct StubAuthorizationService {
    queue: Arc<dyn MessageQueue>,
    profiles: HashMap<String, UserInfo>,
}

impl StubAuthorizationService {
    pub fn new(queue: Arc<dyn MessageQueue>, profiles: HashMap<String, UserInfo>) -> Self {
        Self { queue, profiles }
    }

    /// Parse a profile table: `[{"token": "...", "userInfo": {...}}, ...]`.
    pub fn parse_profiles(json: &str) -> Result<HashMap<String, UserInfo>, StubProfileError> {
        let entries: Vec<StubProfileEntry> = serde_json::from_str(json)?;
        entries
            .into_iter()
            .map(|entry| {
                UserInfo::try_from(entry.user_info)
                    .map(|info| (entry.token.clone(), info))
                    .map_err(|source| StubProfileError::Profile {
                        token: entry.token,
                        source,
                    })
            })
            .collect()
    }

    fn answer(&self, request: &AuthRequest) -> AuthResult {
        match self.profiles.get(&request.token) {
            Some(info) => AuthResult::granted(request.request_id, info.clone()),
            None => AuthResult::denied(request.request_id, "invalid or expired token"),
        }
    }

    /// Answer one request record. Malformed requests are dropped.
    pub async fn handle(&self, payload: &str) -> Result<(), QueueError> {
        let request = match serde_json::from_str::<AuthRequestMessage>(payload)
            .map_err(|e| e.to_string())
            .and_then(|dto| AuthRequest::try_from(dto).map_err(|e| e.to_string()))
        {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Stub auth dropped a malformed request: {}", e);
                return Ok(());
            }
        };

        let result = self.answer(&request);
        let payload = serde_json::to_string(&AuthResultMessage::from(&result))
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        self.queue
            .send(
                TOPIC_AUTH_RESULT,
                &request.request_id.to_string(),
                &payload,
            )
            .await?;
        tracing::debug!(
            "Stub auth answered {} (success: {})",
            request.request_id,
            result.success
        );
        Ok(())
    }

    pub async fn run(self: Arc<Self>, mut subscription: Box<dyn QueueSubscription>) {
        while let Some(record) = subscription.next().await {
            if let Err(e) = self.handle(&record.payload).await {
                tracing::error!("Stub auth could not answer: {}", e);
            }
        }
    }
}
