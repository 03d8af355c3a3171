use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  entities::idea::{encode_resources, Idea, IdeaRow, ResourceRequirement},
  error::{ApiError, ApiResult},
  service::query,
};

const FIND_IDEA_BY_ID: &str = "SELECT * FROM ideas WHERE id = ?1";
const INSERT_IDEA: &str = r#"
    INSERT INTO ideas (
      id, title, problem_statement, solution, project_description, resources, timeline,
      needs_project_manager, creator_id, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
    RETURNING *
"#;
const UPDATE_IDEA: &str = r#"
    UPDATE ideas
    SET title = ?1, problem_statement = ?2, solution = ?3, project_description = ?4, resources = ?5,
        timeline = ?6, needs_project_manager = ?7, updated_at = ?8
    WHERE id = ?9
    RETURNING *
"#;
const UPDATE_IMAGE_URL: &str = "UPDATE ideas SET image_url = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *";

#[derive(Debug, Clone)]
pub struct IdeaParams {
  pub title: String,
  pub problem_statement: String,
  pub solution: String,
  pub project_description: String,
  pub resources: Vec<ResourceRequirement>,
  pub timeline: Option<String>,
  pub needs_project_manager: bool,
}

/// Creates a new idea owned by `creator_id`
pub async fn create(pool: &SqlitePool, creator_id: Uuid, params: IdeaParams) -> ApiResult<Idea> {
  let resources = encode_resources(&params.resources).map_err(|e| ApiError::InvalidInput(e.to_string()))?;

  let row = sqlx::query_as::<_, IdeaRow>(INSERT_IDEA)
    .bind(Uuid::new_v4())
    .bind(&params.title)
    .bind(&params.problem_statement)
    .bind(&params.solution)
    .bind(&params.project_description)
    .bind(resources)
    .bind(&params.timeline)
    .bind(params.needs_project_manager)
    .bind(creator_id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

  load(pool, row.id).await
}

/// Replaces the editable fields of an idea
///
/// # Errors
/// - ResourceNotFound if the idea doesn't exist
/// - Forbidden if `user_id` is not the idea's creator
pub async fn update(pool: &SqlitePool, id: Uuid, user_id: Uuid, params: IdeaParams) -> ApiResult<Idea> {
  ensure_creator(pool, id, user_id).await?;

  let resources = encode_resources(&params.resources).map_err(|e| ApiError::InvalidInput(e.to_string()))?;

  sqlx::query_as::<_, IdeaRow>(UPDATE_IDEA)
    .bind(&params.title)
    .bind(&params.problem_statement)
    .bind(&params.solution)
    .bind(&params.project_description)
    .bind(resources)
    .bind(&params.timeline)
    .bind(params.needs_project_manager)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await?;

  load(pool, id).await
}

pub async fn set_image_url(pool: &SqlitePool, id: Uuid, user_id: Uuid, image_url: &str) -> ApiResult<Idea> {
  ensure_creator(pool, id, user_id).await?;

  sqlx::query_as::<_, IdeaRow>(UPDATE_IMAGE_URL)
    .bind(image_url)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await?;

  load(pool, id).await
}

/// Returns the idea row when `user_id` created it.
pub async fn ensure_creator(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> ApiResult<IdeaRow> {
  let idea = sqlx::query_as::<_, IdeaRow>(FIND_IDEA_BY_ID)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))?;

  if idea.creator_id != user_id {
    return Err(ApiError::Forbidden("Only the idea's creator can do this".to_string()));
  }

  Ok(idea)
}

async fn load(pool: &SqlitePool, id: Uuid) -> ApiResult<Idea> {
  query::ideas::find_by_id(pool, id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}
