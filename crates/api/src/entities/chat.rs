use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, ToSchema)]
pub struct ChatMessage {
  pub id: Uuid,
  pub project_id: Uuid,
  pub user_id: Option<Uuid>,
  pub message: String,
  pub username: Option<String>,
  pub email: Option<String>,
  pub is_system_message: bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, ToSchema)]
pub struct TypingIndicator {
  pub project_id: Uuid,
  pub user_id: Uuid,
  pub username: String,
  /// Unix timestamp (seconds) after which the indicator is stale.
  pub expires_at: i64,
}
