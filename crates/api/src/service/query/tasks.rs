use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{entities::task::Task, error::ApiResult};

const LIST_MILESTONE_TASKS: &str = "SELECT * FROM milestone_tasks WHERE milestone_id = ?1 ORDER BY created_at, rowid";
const FIND_TASK: &str = "SELECT * FROM milestone_tasks WHERE id = ?1";

pub async fn list_for_milestone(pool: &SqlitePool, milestone_id: Uuid) -> ApiResult<Vec<Task>> {
  sqlx::query_as::<_, Task>(LIST_MILESTONE_TASKS)
    .bind(milestone_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> ApiResult<Option<Task>> {
  sqlx::query_as::<_, Task>(FIND_TASK)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}
