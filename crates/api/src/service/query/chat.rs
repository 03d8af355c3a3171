use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  entities::chat::{ChatMessage, TypingIndicator},
  error::ApiResult,
};

// Newest page first, re-ordered oldest first for display.
const LIST_MESSAGES: &str = r#"
  SELECT * FROM (
    SELECT *, rowid AS seq FROM chat_messages
    WHERE project_id = ?1
    ORDER BY created_at DESC, rowid DESC
    LIMIT ?2 OFFSET ?3
  )
  ORDER BY created_at, seq
"#;
const LIST_TYPING: &str = r#"
  SELECT * FROM typing_indicators
  WHERE project_id = ?1 AND expires_at > ?2
  ORDER BY username
"#;

pub async fn list_messages(pool: &SqlitePool, project_id: Uuid, limit: i64, offset: i64) -> ApiResult<Vec<ChatMessage>> {
  sqlx::query_as::<_, ChatMessage>(LIST_MESSAGES)
    .bind(project_id)
    .bind(limit.clamp(1, 200))
    .bind(offset.max(0))
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Typing indicators that have not expired at unix time `now`
pub async fn typing(pool: &SqlitePool, project_id: Uuid, now: i64) -> ApiResult<Vec<TypingIndicator>> {
  sqlx::query_as::<_, TypingIndicator>(LIST_TYPING)
    .bind(project_id)
    .bind(now)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}
