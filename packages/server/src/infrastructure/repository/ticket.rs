//! TicketRepository on the shared key-value store (`chat:ticket:{id}`, JSON).

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AdmissionTicket, DisplayName, KeyValueStore, RepositoryError, RoomFamily, RoomId, TicketId,
    TicketRepository, Timestamp, UserId,
};

const TICKET_KEY_PREFIX: &str = "chat:ticket:";

fn ticket_key(id: &TicketId) -> String {
    format!("{TICKET_KEY_PREFIX}{}", id.as_str())
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTicket {
    user_id: String,
    display_name: String,
    room_id: String,
    family: String,
    profile_image_url: Option<String>,
    is_winning_fairy: bool,
    expires_at: i64,
}

pub struct KvTicketRepository {
    store: Arc<dyn KeyValueStore>,
}

impl KvTicketRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TicketRepository for KvTicketRepository {
    async fn save(&self, ticket: &AdmissionTicket, ttl: Duration) -> Result<(), RepositoryError> {
        let stored = StoredTicket {
            user_id: ticket.user_id.as_str().to_string(),
            display_name: ticket.display_name.as_str().to_string(),
            room_id: ticket.room_id.as_str().to_string(),
            family: ticket.family.as_str().to_string(),
            profile_image_url: ticket.profile_image_url.clone(),
            is_winning_fairy: ticket.is_winning_fairy,
            expires_at: ticket.expires_at.value(),
        };
        let json =
            serde_json::to_string(&stored).map_err(|e| RepositoryError::Corrupted(e.to_string()))?;
        self.store
            .set(&ticket_key(&ticket.id), &json, Some(ttl))
            .await?;
        Ok(())
    }

    async fn find(&self, id: &TicketId) -> Result<Option<AdmissionTicket>, RepositoryError> {
        let Some(json) = self.store.get(&ticket_key(id)).await? else {
            return Ok(None);
        };
        let corrupted = |what: String| RepositoryError::Corrupted(format!("ticket '{id}': {what}"));
        let stored: StoredTicket =
            serde_json::from_str(&json).map_err(|e| corrupted(e.to_string()))?;
        Ok(Some(AdmissionTicket {
            id: id.clone(),
            user_id: UserId::new(stored.user_id).map_err(|e| corrupted(e.to_string()))?,
            display_name: DisplayName::new(stored.display_name)
                .map_err(|e| corrupted(e.to_string()))?,
            room_id: RoomId::new(stored.room_id).map_err(|e| corrupted(e.to_string()))?,
            family: RoomFamily::parse(&stored.family)
                .ok_or_else(|| corrupted(format!("unknown family '{}'", stored.family)))?,
            profile_image_url: stored.profile_image_url,
            is_winning_fairy: stored.is_winning_fairy,
            expires_at: Timestamp::new(stored.expires_at),
        }))
    }
}
