//! `auth-result` consumer: moves authorization results into the correlation table.

use std::{sync::Arc, time::Duration};

use super::result_key;
use crate::{
    domain::{AuthResult, KeyValueStore, QueueSubscription},
    infrastructure::dto::queue::AuthResultMessage,
};

pub struct AuthResultConsumer {
    store: Arc<dyn KeyValueStore>,
    result_ttl: Duration,
}

impl AuthResultConsumer {
    pub fn new(store: Arc<dyn KeyValueStore>, result_ttl: Duration) -> Self {
        Self { store, result_ttl }
    }

    /// Store one result. Malformed records are logged and skipped.
    /// Returns whether the result was stored.
    pub async fn handle(&self, payload: &str) -> bool {
        let dto: AuthResultMessage = match serde_json::from_str(payload) {
            Ok(dto) => dto,
            Err(e) => {
                tracing::warn!("Skipping malformed auth result: {}", e);
                return false;
            }
        };
        let result = match AuthResult::try_from(dto.clone()) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Skipping invalid auth result: {}", e);
                return false;
            }
        };

        // 同じ requestId の結果は上書きする（冪等）
        let stored = serde_json::to_string(&dto).map_err(|e| e.to_string());
        let written = match stored {
            Ok(json) => self
                .store
                .set(&result_key(result.request_id), &json, Some(self.result_ttl))
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => {
                tracing::debug!(
                    "Stored auth result {} (success: {})",
                    result.request_id,
                    result.success
                );
                true
            }
            Err(e) => {
                tracing::error!("Failed to store auth result {}: {}", result.request_id, e);
                false
            }
        }
    }

    pub async fn run(self: Arc<Self>, mut subscription: Box<dyn QueueSubscription>) {
        while let Some(record) = subscription.next().await {
            self.handle(&record.payload).await;
        }
        tracing::info!("Auth result subscription ended");
    }
}
