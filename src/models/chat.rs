use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::Role;
use crate::{AppError, AppResult};

pub const MAX_MESSAGE_LEN: usize = 2000;

/// A message in a patient's support conversation. Conversations are keyed by patient.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: Role,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub patient_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: Role,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub patient_id: Uuid,
    pub message_count: i64,
    pub last_message_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostMessageInput {
    pub body: String,
}

impl PostMessageInput {
    pub fn validated_body(&self) -> AppResult<String> {
        let body = self.body.trim();
        if body.is_empty() {
            return Err(AppError::Validation("message body is required".to_string()));
        }
        if body.chars().count() > MAX_MESSAGE_LEN {
            return Err(AppError::Validation(format!(
                "message body must be at most {} characters",
                MAX_MESSAGE_LEN
            )));
        }
        Ok(body.to_string())
    }
}
