use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  entities::task::{Task, WorkStatus},
  error::{ApiError, ApiResult},
  service::query,
};

// SQL Query Constants
const INSERT_TASK: &str = r#"
  INSERT INTO milestone_tasks (
    id, milestone_id, title, description, assignee_id, due_date, status, reviewed, created_by, created_at, updated_at
  )
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, FALSE, ?8, ?9, ?9)
  RETURNING *
"#;

const UPDATE_TASK: &str = r#"
  UPDATE milestone_tasks
  SET title = ?1, description = ?2, assignee_id = ?3, due_date = ?4, status = ?5, updated_at = ?6
  WHERE id = ?7
  RETURNING *
"#;

const REVIEW_TASK: &str = "UPDATE milestone_tasks SET reviewed = TRUE, updated_at = ?1 WHERE id = ?2 RETURNING *";
const UPDATE_EVIDENCE: &str = "UPDATE milestone_tasks SET evidence_url = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *";

#[derive(Debug, Deserialize)]
pub struct CreateTaskParams {
  pub milestone_id: Uuid,
  pub title: String,
  pub description: String,
  pub assignee_id: Option<Uuid>,
  pub due_date: Option<NaiveDate>,
  pub created_by: Uuid,
}

/// Adds a `pending`, unreviewed task to a milestone
///
/// # Errors
/// - ResourceNotFound if the milestone doesn't exist
pub async fn create(pool: &SqlitePool, params: CreateTaskParams) -> ApiResult<Task> {
  if query::milestones::find_row(pool, params.milestone_id).await?.is_none() {
    return Err(ApiError::ResourceNotFound(params.milestone_id.to_string()));
  }

  sqlx::query_as::<_, Task>(INSERT_TASK)
    .bind(Uuid::new_v4())
    .bind(params.milestone_id)
    .bind(&params.title)
    .bind(&params.description)
    .bind(params.assignee_id)
    .bind(params.due_date)
    .bind(WorkStatus::Pending)
    .bind(params.created_by)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateTaskParams {
  pub title: Option<String>,
  pub description: Option<String>,
  pub assignee_id: Option<Uuid>,
  pub due_date: Option<NaiveDate>,
  pub status: Option<WorkStatus>,
}

/// Partially updates a task. Fields left as `None` keep their current value.
pub async fn update(pool: &SqlitePool, id: Uuid, params: UpdateTaskParams) -> ApiResult<Task> {
  let current = get_task(pool, id).await?;

  sqlx::query_as::<_, Task>(UPDATE_TASK)
    .bind(params.title.unwrap_or(current.title))
    .bind(params.description.unwrap_or(current.description))
    .bind(params.assignee_id.or(current.assignee_id))
    .bind(params.due_date.or(current.due_date))
    .bind(params.status.unwrap_or(current.status))
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn review(pool: &SqlitePool, id: Uuid) -> ApiResult<Task> {
  sqlx::query_as::<_, Task>(REVIEW_TASK)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}

pub async fn set_evidence_url(pool: &SqlitePool, id: Uuid, evidence_url: &str) -> ApiResult<Task> {
  sqlx::query_as::<_, Task>(UPDATE_EVIDENCE)
    .bind(evidence_url)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}

async fn get_task(pool: &SqlitePool, id: Uuid) -> ApiResult<Task> {
  query::tasks::find_by_id(pool, id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}
