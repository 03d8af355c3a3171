use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  entities::{
    milestone::{Milestone, MilestoneRow},
    task::WorkStatus,
  },
  error::{ApiError, ApiResult},
  service::query,
};

const INSERT_MILESTONE: &str = r#"
    INSERT INTO milestones (id, project_id, title, description, due_date, status, created_by, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
    RETURNING *
"#;
const UPDATE_MILESTONE: &str = r#"
    UPDATE milestones
    SET title = ?1, description = ?2, due_date = ?3, status = ?4, updated_at = ?5
    WHERE id = ?6
    RETURNING *
"#;

#[derive(Debug, Clone)]
pub struct CreateMilestoneParams {
  pub project_id: Uuid,
  pub title: String,
  pub description: String,
  pub due_date: NaiveDate,
  pub created_by: Uuid,
}

/// Creates a milestone in `pending` state
///
/// # Errors
/// - ResourceNotFound if the project doesn't exist
pub async fn create(pool: &SqlitePool, params: CreateMilestoneParams) -> ApiResult<Milestone> {
  if query::ideas::find_row(pool, params.project_id).await?.is_none() {
    return Err(ApiError::ResourceNotFound(params.project_id.to_string()));
  }

  let row = sqlx::query_as::<_, MilestoneRow>(INSERT_MILESTONE)
    .bind(Uuid::new_v4())
    .bind(params.project_id)
    .bind(&params.title)
    .bind(&params.description)
    .bind(params.due_date)
    .bind(WorkStatus::Pending)
    .bind(params.created_by)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

  Ok(Milestone::from_row(row, vec![]))
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMilestoneParams {
  pub title: Option<String>,
  pub description: Option<String>,
  pub due_date: Option<NaiveDate>,
  pub status: Option<WorkStatus>,
}

/// Partially updates a milestone. Fields left as `None` keep their current value.
pub async fn update(pool: &SqlitePool, id: Uuid, params: UpdateMilestoneParams) -> ApiResult<Milestone> {
  let current = query::milestones::find_row(pool, id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))?;

  let row = sqlx::query_as::<_, MilestoneRow>(UPDATE_MILESTONE)
    .bind(params.title.unwrap_or(current.title))
    .bind(params.description.unwrap_or(current.description))
    .bind(params.due_date.unwrap_or(current.due_date))
    .bind(params.status.unwrap_or(current.status))
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await?;

  let tasks = query::tasks::list_for_milestone(pool, id).await?;

  Ok(Milestone::from_row(row, tasks))
}
