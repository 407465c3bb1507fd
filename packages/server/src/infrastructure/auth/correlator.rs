//! Auth Correlator
//!
//! 認可リクエストをキューに送り、結果は共有ストアの相関テーブル
//! （`chat:auth-result:{requestId}`）をポーリングして受け取ります。
//! ブロッキング RPC ではなく、タイムアウト付きのポーリングです。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::Instant;

use super::result_key;
use crate::{
    domain::{
        AuthAction, AuthCorrelation, AuthError, AuthRequest, AuthResult, GameId, KeyValueStore,
        MessageQueue, RequestId, RoomFamily,
        queue::{TOPIC_AUTH_REQUEST_MATCH, TOPIC_AUTH_REQUEST_WATCH},
    },
    infrastructure::dto::queue::{AuthRequestMessage, AuthResultMessage},
};

fn request_topic(chat_type: RoomFamily) -> &'static str {
    match chat_type {
        RoomFamily::Watch => TOPIC_AUTH_REQUEST_WATCH,
        RoomFamily::Match => TOPIC_AUTH_REQUEST_MATCH,
    }
}

pub struct AuthCorrelator {
    queue: Arc<dyn MessageQueue>,
    store: Arc<dyn KeyValueStore>,
    poll_interval: Duration,
}

impl AuthCorrelator {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        store: Arc<dyn KeyValueStore>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            poll_interval,
        }
    }

    /// Take the stored result if it is there. A taken result is gone.
    async fn take(&self, request_id: RequestId) -> Result<Option<AuthResult>, AuthError> {
        let key = result_key(request_id);
        let stored = self
            .store
            .get(&key)
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        let Some(json) = stored else {
            return Ok(None);
        };
        if !self
            .store
            .delete(&key)
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?
        {
            // 並行するポーリングが先に取得した
            return Ok(None);
        }

        let dto: AuthResultMessage = serde_json::from_str(&json)
            .map_err(|e| AuthError::Unavailable(format!("stored result is unreadable: {e}")))?;
        AuthResult::try_from(dto)
            .map(Some)
            .map_err(|e| AuthError::Unavailable(format!("stored result is invalid: {e}")))
    }
}

#[async_trait]
impl AuthCorrelation for AuthCorrelator {
    async fn request_auth(
        &self,
        token: String,
        chat_type: RoomFamily,
        action: AuthAction,
        game_id: Option<GameId>,
        room_info: serde_json::Value,
    ) -> Result<RequestId, AuthError> {
        let request = AuthRequest {
            request_id: RequestId::generate(),
            token,
            chat_type,
            action,
            game_id,
            room_info,
        };
        let payload = serde_json::to_string(&AuthRequestMessage::from(&request))
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        self.queue
            .send(
                request_topic(chat_type),
                &request.request_id.to_string(),
                &payload,
            )
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        tracing::debug!(
            "Auth request {} sent ({} {})",
            request.request_id,
            chat_type.as_str(),
            action.as_str()
        );
        Ok(request.request_id)
    }

    async fn poll_result(
        &self,
        request_id: RequestId,
        timeout: Duration,
    ) -> Result<AuthResult, AuthError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(result) = self.take(request_id).await? {
                return Ok(result);
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!("No auth result for {} within {:?}", request_id, timeout);
                return Err(AuthError::Timeout(request_id));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
