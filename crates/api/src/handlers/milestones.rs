use axum::{
  extract::{Path, State},
  http::StatusCode,
  middleware::from_fn_with_state,
  Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  entities::{
    milestone::Milestone,
    task::{Task, WorkStatus},
    user::User,
  },
  error::{ApiError, ApiResult},
  handlers::auth::auth_guard,
  service::{mutation, query},
  state::AppState,
  AppJson,
};

const MILESTONES_TAG: &str = "milestones";

pub fn init_milestones_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(create_milestone))
    .routes(routes!(update_milestone))
    .routes(routes!(list_tasks, create_task))
    .layer(from_fn_with_state(state, auth_guard))
}

/// Parses a status sent as plain text, rejecting anything outside `pending|in_progress|completed`.
pub(crate) fn parse_status(raw: Option<String>) -> ApiResult<Option<WorkStatus>> {
  raw
    .map(|value| value.parse::<WorkStatus>().map_err(|_| ApiError::InvalidStatus(value)))
    .transpose()
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct CreateMilestone {
  project_id: Uuid,
  #[validate(length(min = 1, max = 200))]
  title: String,
  #[serde(default)]
  description: String,
  due_date: NaiveDate,
}

#[utoipa::path(
  post,
  path = "",
  tag = MILESTONES_TAG,
  request_body = CreateMilestone,
  responses(
    (status = 201, description = "Milestone created in pending state", body = Milestone),
    (status = 404, description = "Project not found"),
    (status = 400, description = "Validation error")
  )
)]
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn create_milestone(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  AppJson(input): AppJson<CreateMilestone>,
) -> ApiResult<(StatusCode, Json<Milestone>)> {
  debug!("Register new milestone with request: {:?}", input);

  input.validate()?;

  let milestone = mutation::milestones::create(
    &state.pool,
    mutation::milestones::CreateMilestoneParams {
      project_id: input.project_id,
      title: input.title,
      description: input.description,
      due_date: input.due_date,
      created_by: user.id,
    },
  )
  .await?;

  Ok((StatusCode::CREATED, Json(milestone)))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct UpdateMilestone {
  #[validate(length(min = 1, max = 200))]
  title: Option<String>,
  description: Option<String>,
  due_date: Option<NaiveDate>,
  status: Option<String>,
}

#[utoipa::path(
  patch,
  path = "/{id}",
  tag = MILESTONES_TAG,
  request_body = UpdateMilestone,
  responses(
    (status = 200, description = "Milestone updated", body = Milestone),
    (status = 400, description = "Invalid status"),
    (status = 404, description = "Milestone not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Milestone id")
  )
)]
#[instrument(skip(state), fields(milestone_id = %id))]
async fn update_milestone(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<UpdateMilestone>,
) -> ApiResult<Json<Milestone>> {
  debug!("Update milestone with id {} and params {:?}", id, input);

  input.validate()?;

  let milestone = mutation::milestones::update(
    &state.pool,
    id,
    mutation::milestones::UpdateMilestoneParams {
      status: parse_status(input.status)?,
      title: input.title,
      description: input.description,
      due_date: input.due_date,
    },
  )
  .await?;

  Ok(Json(milestone))
}

#[utoipa::path(
  get,
  path = "/{id}/tasks",
  tag = MILESTONES_TAG,
  responses(
    (status = 200, description = "Tasks of a milestone", body = [Task]),
    (status = 404, description = "Milestone not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Milestone id")
  )
)]
#[instrument(skip(state), fields(milestone_id = %id))]
async fn list_tasks(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<Task>>> {
  if query::milestones::find_row(&state.pool, id).await?.is_none() {
    return Err(ApiError::ResourceNotFound(id.to_string()));
  }

  let tasks = query::tasks::list_for_milestone(&state.pool, id).await?;

  Ok(Json(tasks))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct CreateTask {
  #[validate(length(min = 1, max = 200))]
  title: String,
  #[serde(default)]
  description: String,
  assignee_id: Option<Uuid>,
  due_date: Option<NaiveDate>,
}

#[utoipa::path(
  post,
  path = "/{id}/tasks",
  tag = MILESTONES_TAG,
  request_body = CreateTask,
  responses(
    (status = 201, description = "Task created in pending state", body = Task),
    (status = 404, description = "Milestone not found"),
    (status = 400, description = "Validation error")
  ),
  params(
    ("id" = Uuid, Path, description = "Milestone id")
  )
)]
#[instrument(skip(state, user, input), fields(milestone_id = %id, user_id = %user.id))]
async fn create_task(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<CreateTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
  debug!("Register new task with request: {:?}", input);

  input.validate()?;

  let task = mutation::tasks::create(
    &state.pool,
    mutation::tasks::CreateTaskParams {
      milestone_id: id,
      title: input.title,
      description: input.description,
      assignee_id: input.assignee_id,
      due_date: input.due_date,
      created_by: user.id,
    },
  )
  .await?;

  Ok((StatusCode::CREATED, Json(task)))
}
