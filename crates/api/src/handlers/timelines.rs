use axum::{
  extract::{Path, State},
  http::StatusCode,
  middleware::from_fn_with_state,
  Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  entities::timeline::Timeline,
  error::ApiResult,
  handlers::auth::auth_guard,
  service::mutation::{self, timelines::TimelineParams},
  state::AppState,
  AppJson,
};

const TIMELINE_TAG: &str = "timeline";

pub fn init_timeline_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(create_timeline))
    .routes(routes!(update_timeline))
    .layer(from_fn_with_state(state, auth_guard))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct CreateTimeline {
  project_id: Uuid,
  start_date: NaiveDate,
  end_date: NaiveDate,
  #[serde(default)]
  #[validate(length(max = 2000))]
  description: String,
}

#[utoipa::path(
  post,
  path = "",
  tag = TIMELINE_TAG,
  request_body = CreateTimeline,
  responses(
    (status = 201, description = "Timeline created", body = Timeline),
    (status = 400, description = "End date before start date"),
    (status = 404, description = "Project not found")
  )
)]
#[instrument(skip(state, input))]
async fn create_timeline(
  State(state): State<AppState>,
  AppJson(input): AppJson<CreateTimeline>,
) -> ApiResult<(StatusCode, Json<Timeline>)> {
  debug!("Register new timeline with request: {:?}", input);

  input.validate()?;

  let timeline = mutation::timelines::create(
    &state.pool,
    input.project_id,
    TimelineParams {
      start_date: input.start_date,
      end_date: input.end_date,
      description: input.description,
    },
  )
  .await?;

  Ok((StatusCode::CREATED, Json(timeline)))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct UpdateTimeline {
  start_date: NaiveDate,
  end_date: NaiveDate,
  #[serde(default)]
  #[validate(length(max = 2000))]
  description: String,
}

#[utoipa::path(
  put,
  path = "/{id}",
  tag = TIMELINE_TAG,
  request_body = UpdateTimeline,
  responses(
    (status = 200, description = "Timeline updated", body = Timeline),
    (status = 400, description = "End date before start date"),
    (status = 404, description = "Timeline not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Timeline id")
  )
)]
#[instrument(skip(state), fields(timeline_id = %id))]
async fn update_timeline(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<UpdateTimeline>,
) -> ApiResult<Json<Timeline>> {
  debug!("Update timeline with id {} and params {:?}", id, input);

  input.validate()?;

  let timeline = mutation::timelines::update(
    &state.pool,
    id,
    TimelineParams {
      start_date: input.start_date,
      end_date: input.end_date,
      description: input.description,
    },
  )
  .await?;

  Ok(Json(timeline))
}
