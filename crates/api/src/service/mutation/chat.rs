use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  entities::{
    chat::{ChatMessage, TypingIndicator},
    user::User,
  },
  error::ApiResult,
};

const INSERT_MESSAGE: &str = r#"
  INSERT INTO chat_messages (id, project_id, user_id, message, username, email, is_system_message, created_at)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
  RETURNING *
"#;
const UPSERT_TYPING: &str = r#"
  INSERT INTO typing_indicators (project_id, user_id, username, expires_at)
  VALUES (?1, ?2, ?3, ?4)
  ON CONFLICT (project_id, user_id) DO UPDATE SET
    username = excluded.username,
    expires_at = excluded.expires_at
  RETURNING *
"#;
const DELETE_EXPIRED_TYPING: &str = "DELETE FROM typing_indicators WHERE expires_at <= ?1";

/// Stores a message written by `author`, snapshotting their username and email.
pub async fn post_message(pool: &SqlitePool, project_id: Uuid, author: &User, message: &str) -> ApiResult<ChatMessage> {
  insert_message(
    pool,
    project_id,
    Some(author.id),
    message,
    Some(author.username.as_str()),
    author.email.as_deref(),
    false,
  )
  .await
}

/// Stores a message authored by the platform itself, e.g. join announcements.
pub async fn post_system_message(pool: &SqlitePool, project_id: Uuid, message: &str) -> ApiResult<ChatMessage> {
  insert_message(pool, project_id, None, message, None, None, true).await
}

pub async fn set_typing(
  pool: &SqlitePool,
  project_id: Uuid,
  user: &User,
  expires_at: i64,
) -> ApiResult<TypingIndicator> {
  sqlx::query_as::<_, TypingIndicator>(UPSERT_TYPING)
    .bind(project_id)
    .bind(user.id)
    .bind(&user.username)
    .bind(expires_at)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

/// Deletes typing indicators that expired at or before unix time `now`
pub async fn delete_expired_typing(pool: &SqlitePool, now: i64) -> ApiResult<u64> {
  let result = sqlx::query(DELETE_EXPIRED_TYPING).bind(now).execute(pool).await?;

  Ok(result.rows_affected())
}

async fn insert_message(
  pool: &SqlitePool,
  project_id: Uuid,
  user_id: Option<Uuid>,
  message: &str,
  username: Option<&str>,
  email: Option<&str>,
  is_system_message: bool,
) -> ApiResult<ChatMessage> {
  sqlx::query_as::<_, ChatMessage>(INSERT_MESSAGE)
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(user_id)
    .bind(message)
    .bind(username)
    .bind(email)
    .bind(is_system_message)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}
