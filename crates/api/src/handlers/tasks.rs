use axum::{
  extract::{Multipart, Path, State},
  middleware::from_fn_with_state,
  Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  entities::task::Task,
  error::{ApiError, ApiResult},
  handlers::{auth::auth_guard, milestones::parse_status, read_upload, UploadForm},
  service::{mutation, query},
  state::AppState,
  AppJson,
};

const TASKS_TAG: &str = "tasks";

pub fn init_tasks_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(update_task))
    .routes(routes!(review_task))
    .routes(routes!(upload_evidence))
    .layer(from_fn_with_state(state, auth_guard))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct UpdateTask {
  #[validate(length(min = 1, max = 200))]
  title: Option<String>,
  description: Option<String>,
  assignee_id: Option<Uuid>,
  due_date: Option<NaiveDate>,
  /// One of `pending`, `in_progress`, `completed`.
  status: Option<String>,
}

#[utoipa::path(
  put,
  path = "/{id}",
  tag = TASKS_TAG,
  request_body = UpdateTask,
  responses(
    (status = 200, description = "Task updated successfully", body = Task),
    (status = 400, description = "Invalid status"),
    (status = 404, description = "Task not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Task id")
  )
)]
#[instrument(skip(state), fields(task_id = %id))]
async fn update_task(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<UpdateTask>,
) -> ApiResult<Json<Task>> {
  debug!("Update task with id {} and params {:?}", id, input);

  input.validate()?;

  let task = mutation::tasks::update(
    &state.pool,
    id,
    mutation::tasks::UpdateTaskParams {
      status: parse_status(input.status)?,
      title: input.title,
      description: input.description,
      assignee_id: input.assignee_id,
      due_date: input.due_date,
    },
  )
  .await?;

  Ok(Json(task))
}

#[utoipa::path(
  post,
  path = "/{id}/review",
  tag = TASKS_TAG,
  responses(
    (status = 200, description = "Task marked as reviewed", body = Task),
    (status = 404, description = "Task not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Task id")
  )
)]
#[instrument(skip(state), fields(task_id = %id))]
async fn review_task(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Task>> {
  let task = mutation::tasks::review(&state.pool, id).await?;

  info!("Task {} reviewed", id);

  Ok(Json(task))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceResponse {
  evidence_url: String,
}

#[utoipa::path(
  post,
  path = "/{id}/evidence",
  tag = TASKS_TAG,
  request_body(content = UploadForm, content_type = "multipart/form-data"),
  responses(
    (status = 200, description = "Evidence stored", body = EvidenceResponse),
    (status = 400, description = "Missing, empty or oversized file"),
    (status = 404, description = "Task not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Task id")
  )
)]
#[instrument(skip(state, multipart), fields(task_id = %id))]
async fn upload_evidence(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  multipart: Multipart,
) -> ApiResult<Json<EvidenceResponse>> {
  if query::tasks::find_by_id(&state.pool, id).await?.is_none() {
    return Err(ApiError::ResourceNotFound(id.to_string()));
  }

  let (file_name, bytes) = read_upload(multipart).await?;

  debug!("Store evidence {} ({} bytes)", file_name, bytes.len());

  let evidence_url = state.uploads.save(&id.to_string(), &file_name, &bytes).await?;
  mutation::tasks::set_evidence_url(&state.pool, id, &evidence_url).await?;

  Ok(Json(EvidenceResponse { evidence_url }))
}
