use axum::{
  extract::{Multipart, Path, Query, State},
  http::StatusCode,
  middleware::from_fn_with_state,
  Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
  availability::{self, TeamAvailability},
  entities::{
    idea::{Idea, ResourceRequirement},
    user::User,
  },
  error::{ApiError, ApiResult},
  handlers::{auth::auth_guard, read_upload, UploadForm},
  service::{mutation, query},
  state::AppState,
  AppJson,
};

const IDEAS_TAG: &str = "ideas";
const DEFAULT_PAGE: i64 = 1;
const DEFAULT_IDEAS_PER_PAGE: i64 = 10;
/// Upper bound on the summed role counts of one idea.
const MAX_TEAM_SIZE: u64 = 1_000;

pub fn init_ideas_routes(state: AppState) -> OpenApiRouter<AppState> {
  let public_routes = OpenApiRouter::new()
    .routes(routes!(list_ideas))
    .routes(routes!(get_idea))
    .routes(routes!(get_availability));

  let protected_routes = OpenApiRouter::new()
    .routes(routes!(create_idea))
    .routes(routes!(update_idea))
    .routes(routes!(upload_image))
    .layer(from_fn_with_state(state, auth_guard));

  public_routes.merge(protected_routes)
}

#[derive(Debug, Deserialize, IntoParams)]
struct ListIdeasParams {
  page: Option<i64>,
  ideas_per_page: Option<i64>,
}

#[utoipa::path(
  get,
  path = "",
  tag = IDEAS_TAG,
  params(
    ListIdeasParams
  ),
  responses(
    (status = 200, description = "List ideas, newest first", body = [Idea])
  )
)]
#[instrument(skip(state))]
async fn list_ideas(
  State(state): State<AppState>,
  Query(params): Query<ListIdeasParams>,
) -> ApiResult<Json<Vec<Idea>>> {
  let page = params.page.unwrap_or(DEFAULT_PAGE);
  let ideas_per_page = params.ideas_per_page.unwrap_or(DEFAULT_IDEAS_PER_PAGE);

  let (ideas, _num_pages) = query::ideas::list(&state.pool, page, ideas_per_page).await?;

  Ok(Json(ideas))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct IdeaRequest {
  #[validate(length(min = 1, max = 200))]
  title: String,
  #[validate(length(min = 1))]
  problem_statement: String,
  #[validate(length(min = 1))]
  solution: String,
  #[serde(default)]
  project_description: String,
  #[validate(custom(function = "validate_resources"))]
  resources: Vec<ResourceRequirement>,
  timeline: Option<String>,
  #[serde(default)]
  needs_project_manager: bool,
}

impl From<IdeaRequest> for mutation::ideas::IdeaParams {
  fn from(input: IdeaRequest) -> Self {
    let resources = input
      .resources
      .into_iter()
      .map(|resource| ResourceRequirement {
        role: resource.role.trim().to_string(),
        ..resource
      })
      .collect();

    Self {
      title: input.title,
      problem_statement: input.problem_statement,
      solution: input.solution,
      project_description: input.project_description,
      resources,
      timeline: input.timeline,
      needs_project_manager: input.needs_project_manager,
    }
  }
}

fn validate_resources(resources: &[ResourceRequirement]) -> Result<(), ValidationError> {
  if resources.iter().any(|r| r.role.trim().is_empty()) {
    return Err(ValidationError::new("empty_role"));
  }
  if resources.iter().any(|r| r.count == 0) {
    return Err(ValidationError::new("zero_count"));
  }
  let team_size: u64 = resources.iter().map(|r| u64::from(r.count)).sum();
  if team_size > MAX_TEAM_SIZE {
    return Err(ValidationError::new("team_too_large"));
  }
  Ok(())
}

#[utoipa::path(
  post,
  path = "",
  tag = IDEAS_TAG,
  request_body = IdeaRequest,
  responses(
    (status = 201, description = "Idea created successfully", body = Idea),
    (status = 401, description = "Unauthorized"),
    (status = 400, description = "Validation error")
  )
)]
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn create_idea(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  AppJson(input): AppJson<IdeaRequest>,
) -> ApiResult<(StatusCode, Json<Idea>)> {
  debug!("Register new idea with request: {:?}", input);

  input.validate()?;

  let idea = mutation::ideas::create(&state.pool, user.id, input.into()).await?;

  Ok((StatusCode::CREATED, Json(idea)))
}

/// Idea together with the current state of its team.
#[derive(Debug, Serialize, ToSchema)]
pub struct IdeaDetails {
  #[serde(flatten)]
  idea: Idea,
  availability: TeamAvailability,
}

#[utoipa::path(
  get,
  path = "/{id}",
  tag = IDEAS_TAG,
  responses(
    (status = 200, description = "Idea with team availability", body = IdeaDetails),
    (status = 404, description = "Idea not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Idea id")
  )
)]
#[instrument(skip(state), fields(idea_id = %id))]
async fn get_idea(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<IdeaDetails>> {
  let idea = query::ideas::find_by_id(&state.pool, id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))?;

  let contributors = query::contributors::list(&state.pool, id).await?;
  let availability = availability::evaluate(&idea.resources, &contributors);

  Ok(Json(IdeaDetails { idea, availability }))
}

#[utoipa::path(
  put,
  path = "/{id}",
  tag = IDEAS_TAG,
  request_body = IdeaRequest,
  responses(
    (status = 200, description = "Idea updated successfully", body = Idea),
    (status = 403, description = "Only the creator can edit an idea"),
    (status = 404, description = "Idea not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Idea id")
  )
)]
#[instrument(skip(state, user, input), fields(idea_id = %id, user_id = %user.id))]
async fn update_idea(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<IdeaRequest>,
) -> ApiResult<Json<Idea>> {
  debug!("Update idea with id {} and params {:?}", id, input);

  input.validate()?;

  let idea = mutation::ideas::update(&state.pool, id, user.id, input.into()).await?;

  Ok(Json(idea))
}

#[utoipa::path(
  post,
  path = "/{id}/image",
  tag = IDEAS_TAG,
  request_body(content = UploadForm, content_type = "multipart/form-data"),
  responses(
    (status = 200, description = "Image stored", body = Idea),
    (status = 403, description = "Only the creator can change the image"),
    (status = 404, description = "Idea not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Idea id")
  )
)]
#[instrument(skip(state, user, multipart), fields(idea_id = %id, user_id = %user.id))]
async fn upload_image(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  multipart: Multipart,
) -> ApiResult<Json<Idea>> {
  mutation::ideas::ensure_creator(&state.pool, id, user.id).await?;

  let (file_name, bytes) = read_upload(multipart).await?;
  let url = state.uploads.save(&id.to_string(), &file_name, &bytes).await?;

  debug!("Stored idea image at {}", url);

  let idea = mutation::ideas::set_image_url(&state.pool, id, user.id, &url).await?;

  Ok(Json(idea))
}

#[utoipa::path(
  get,
  path = "/{id}/availability",
  tag = IDEAS_TAG,
  responses(
    (status = 200, description = "Open slots per role", body = TeamAvailability),
    (status = 404, description = "Idea not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Idea id")
  )
)]
#[instrument(skip(state), fields(idea_id = %id))]
async fn get_availability(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<TeamAvailability>> {
  let idea = query::ideas::find_row(&state.pool, id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))?;

  let resources = idea.resources().map_err(|e| ApiError::Anyhow(e.into()))?;
  let contributors = query::contributors::list(&state.pool, id).await?;

  Ok(Json(availability::evaluate(&resources, &contributors)))
}
