use axum::{
  extract::{Path, State},
  middleware::from_fn_with_state,
  Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  entities::{user::User, verification::Verification},
  error::{ApiError, ApiResult},
  handlers::auth::auth_guard,
  service::{
    mutation::{self, verifications::VerificationParams},
    query,
  },
  state::AppState,
  verification::{self, CvCheck, GithubCheck},
  AppJson,
};

const VERIFICATIONS_TAG: &str = "verifications";

pub fn init_verifications_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(get_verification, verify_contributor))
    .layer(from_fn_with_state(state, auth_guard))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct VerificationRequest {
  #[validate(length(min = 1))]
  role: String,
  /// GitHub profile URL or user name. Falls back to the one on the caller's profile.
  github: Option<String>,
}

#[utoipa::path(
  get,
  path = "/{id}/verification",
  tag = VERIFICATIONS_TAG,
  responses(
    (status = 200, description = "Caller's latest verification for the idea", body = Verification),
    (status = 404, description = "Caller was never verified for this idea")
  ),
  params(
    ("id" = Uuid, Path, description = "Idea id")
  )
)]
#[instrument(skip(state, user), fields(idea_id = %id, user_id = %user.id))]
async fn get_verification(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<Verification>> {
  let verification = query::verifications::find(&state.pool, id, user.id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(format!("verification for idea {id}")))?;

  Ok(Json(verification))
}

#[utoipa::path(
  post,
  path = "/{id}/verification",
  tag = VERIFICATIONS_TAG,
  request_body = VerificationRequest,
  responses(
    (status = 200, description = "Verification recorded", body = Verification),
    (status = 400, description = "Neither a CV nor a GitHub account to check"),
    (status = 404, description = "Idea not found"),
    (status = 409, description = "Role is not part of the idea"),
    (status = 502, description = "GitHub could not be reached")
  ),
  params(
    ("id" = Uuid, Path, description = "Idea id")
  )
)]
#[instrument(skip(state, user, input), fields(idea_id = %id, user_id = %user.id))]
async fn verify_contributor(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<VerificationRequest>,
) -> ApiResult<Json<Verification>> {
  input.validate()?;

  let idea = query::ideas::find_row(&state.pool, id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))?;

  let role = input.role.trim().to_string();
  mutation::contributors::required_for_role(&idea, &role)?;

  let cv = check_cv(&state, &user, &role).await?;
  let github = check_github(&state, &user, input.github.as_deref(), &role).await?;

  if cv.is_none() && github.is_none() {
    return Err(ApiError::InvalidInput(
      "Upload a CV or link a GitHub account before verifying".to_string(),
    ));
  }

  let verification = mutation::verifications::record(
    &state.pool,
    VerificationParams {
      idea_id: idea.id,
      user_id: user.id,
      role,
      cv,
      github,
    },
  )
  .await?;

  Ok(Json(verification))
}

async fn check_cv(state: &AppState, user: &User, role: &str) -> ApiResult<Option<CvCheck>> {
  let Some(cv_url) = user.cv_url.as_deref() else {
    return Ok(None);
  };

  let Some(bytes) = state.uploads.read(cv_url).await? else {
    debug!("CV {} of user {} is gone", cv_url, user.id);
    return Ok(None);
  };

  Ok(Some(verification::check_cv(&String::from_utf8_lossy(&bytes), role)))
}

async fn check_github(
  state: &AppState,
  user: &User,
  requested: Option<&str>,
  role: &str,
) -> ApiResult<Option<(String, GithubCheck)>> {
  let Some(input) = requested.or(user.github.as_deref()).filter(|input| !input.trim().is_empty()) else {
    return Ok(None);
  };

  let username = verification::github_username(input)
    .ok_or_else(|| ApiError::InvalidInput(format!("`{input}` is not a GitHub account")))?;
  let repos = state.github.repo_languages(&username).await?;

  Ok(Some((username, verification::check_github(role, &repos))))
}
