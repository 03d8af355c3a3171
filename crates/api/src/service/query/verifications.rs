use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{entities::verification::Verification, error::ApiResult};

const FIND_VERIFICATION: &str = "SELECT * FROM contributor_verifications WHERE idea_id = ?1 AND user_id = ?2";

pub async fn find(pool: &SqlitePool, idea_id: Uuid, user_id: Uuid) -> ApiResult<Option<Verification>> {
  sqlx::query_as::<_, Verification>(FIND_VERIFICATION)
    .bind(idea_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}
