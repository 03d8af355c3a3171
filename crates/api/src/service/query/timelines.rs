use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{entities::timeline::Timeline, error::ApiResult};

const FIND_PROJECT_TIMELINE: &str =
  "SELECT * FROM project_timelines WHERE project_id = ?1 ORDER BY created_at, rowid LIMIT 1";

/// First timeline recorded for a project
pub async fn find_for_project(pool: &SqlitePool, project_id: Uuid) -> ApiResult<Option<Timeline>> {
  sqlx::query_as::<_, Timeline>(FIND_PROJECT_TIMELINE)
    .bind(project_id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}
