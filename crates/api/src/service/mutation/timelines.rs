use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  entities::timeline::Timeline,
  error::{ApiError, ApiResult},
  service::query,
};

const INSERT_TIMELINE: &str = r#"
    INSERT INTO project_timelines (id, project_id, start_date, end_date, description, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
    RETURNING *
"#;
const UPDATE_TIMELINE: &str = r#"
    UPDATE project_timelines
    SET start_date = ?1, end_date = ?2, description = ?3, updated_at = ?4
    WHERE id = ?5
    RETURNING *
"#;

#[derive(Debug, Clone)]
pub struct TimelineParams {
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub description: String,
}

impl TimelineParams {
  fn ensure_ordered(&self) -> ApiResult<()> {
    if self.end_date < self.start_date {
      return Err(ApiError::InvalidInput("End date must not be before start date".to_string()));
    }
    Ok(())
  }
}

pub async fn create(pool: &SqlitePool, project_id: Uuid, params: TimelineParams) -> ApiResult<Timeline> {
  params.ensure_ordered()?;

  if query::ideas::find_row(pool, project_id).await?.is_none() {
    return Err(ApiError::ResourceNotFound(project_id.to_string()));
  }

  sqlx::query_as::<_, Timeline>(INSERT_TIMELINE)
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(params.start_date)
    .bind(params.end_date)
    .bind(&params.description)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn update(pool: &SqlitePool, id: Uuid, params: TimelineParams) -> ApiResult<Timeline> {
  params.ensure_ordered()?;

  sqlx::query_as::<_, Timeline>(UPDATE_TIMELINE)
    .bind(params.start_date)
    .bind(params.end_date)
    .bind(&params.description)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}
