use axum::{
  extract::{Multipart, Query, State},
  http::StatusCode,
  middleware::from_fn_with_state,
  Extension, Json,
};
use secrecy::SecretBox;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_cookies::{
  cookie::{time::Duration, SameSite},
  Cookie, Cookies,
};
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use validator::Validate;

use crate::{
  entities::user::User,
  error::ApiResult,
  handlers::{
    auth::{auth_guard, encode_jwt, AUTH_COOKIE_NAME},
    read_upload, UploadForm,
  },
  service::{mutation, query},
  state::AppState,
  AppJson,
};

const USERS_TAG: &str = "users";
const DEFAULT_PAGE_SIZE: i64 = 10;

pub fn init_users_routes(state: AppState) -> OpenApiRouter<AppState> {
  let public_routes = OpenApiRouter::new()
    .routes(routes!(register))
    .routes(routes!(login));

  let protected_routes = OpenApiRouter::new()
    .routes(routes!(list_users))
    .routes(routes!(logout))
    .routes(routes!(get_me, update_me))
    .routes(routes!(upload_cv))
    .layer(from_fn_with_state(state, auth_guard));

  public_routes.merge(protected_routes)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
  #[validate(length(min = 4))]
  username: String,
  #[validate(length(min = 1))]
  password: String,
}

#[derive(Debug, Serialize, ToSchema)]
struct LoginResponse {
  status: String,
  token: String,
}

#[utoipa::path(
  post,
  path = "/login",
  tag = USERS_TAG,
  request_body = LoginRequest,
  responses(
    (status = 200, description = "Login successful", body = LoginResponse),
    (status = 401, description = "Invalid credentials"),
    (status = 400, description = "Validation error")
  )
)]
#[instrument(skip(state, cookies, input))]
async fn login(
  State(state): State<AppState>,
  cookies: Cookies,
  AppJson(input): AppJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
  input.validate()?;

  let params = mutation::users::LoginParams {
    username: input.username.to_ascii_lowercase(),
    password: SecretBox::new(Box::new(input.password)),
  };

  debug!("Try login user with params {:?}", params);

  let user = mutation::users::login(&state.pool, params).await?;
  let token = encode_jwt(&state.keys, user.id, state.settings.jwt_maxage)?;

  cookies.add(build_auth_cookie(token.clone(), Duration::minutes(state.settings.jwt_maxage)));

  Ok(Json(LoginResponse {
    status: "success".to_string(),
    token,
  }))
}

#[utoipa::path(
  post,
  path = "/logout",
  tag = USERS_TAG,
  responses(
    (status = 200, description = "Logout successful")
  )
)]
async fn logout(cookies: Cookies) -> Json<Value> {
  cookies.add(build_auth_cookie(String::new(), Duration::seconds(-1)));

  Json(json!({ "status": "success" }))
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
pub struct RegisterRequest {
  #[validate(length(min = 4))]
  username: String,
  #[validate(email)]
  email: String,
  #[validate(length(min = 8))]
  password: String,
}

#[utoipa::path(
  post,
  path = "",
  tag = USERS_TAG,
  request_body = RegisterRequest,
  responses(
    (status = 201, description = "User created", body = User),
    (status = 409, description = "Username or email already taken"),
    (status = 400, description = "Validation error")
  )
)]
#[instrument(skip(state, input))]
async fn register(
  State(state): State<AppState>,
  AppJson(input): AppJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
  input.validate()?;

  let params = mutation::users::CreateUserParams {
    username: input.username,
    email: input.email,
    password: SecretBox::new(Box::new(input.password)),
  };

  debug!("Register new user with request: {:?}", params);

  let user = mutation::users::create(&state.pool, params).await?;

  Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
  get,
  path = "/me",
  tag = USERS_TAG,
  responses(
    (status = OK, description = "Return current logged user", body = User),
    (status = 401, description = "Unauthorized")
  )
)]
async fn get_me(Extension(user): Extension<User>) -> ApiResult<Json<User>> {
  Ok(Json(user))
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
pub struct UpdateProfile {
  #[validate(email)]
  email: Option<String>,
  #[validate(url)]
  github: Option<String>,
  #[validate(url)]
  linkedin: Option<String>,
  twitter: Option<String>,
  #[validate(length(equal = 42))]
  wallet_address: Option<String>,
}

#[utoipa::path(
  put,
  path = "/me",
  tag = USERS_TAG,
  request_body = UpdateProfile,
  responses(
    (status = 200, description = "Profile updated", body = User),
    (status = 401, description = "Unauthorized"),
    (status = 400, description = "Validation error")
  )
)]
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn update_me(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  AppJson(input): AppJson<UpdateProfile>,
) -> ApiResult<Json<User>> {
  input.validate()?;

  debug!("Update profile with params {:?}", input);

  let user = mutation::users::update_profile(
    &state.pool,
    user.id,
    mutation::users::UpdateProfileParams {
      email: input.email,
      github: input.github,
      linkedin: input.linkedin,
      twitter: input.twitter,
      wallet_address: input.wallet_address,
    },
  )
  .await?;

  Ok(Json(user))
}

#[utoipa::path(
  post,
  path = "/me/cv",
  tag = USERS_TAG,
  request_body(content = UploadForm, content_type = "multipart/form-data"),
  responses(
    (status = 200, description = "CV uploaded", body = User),
    (status = 401, description = "Unauthorized"),
    (status = 400, description = "Missing or empty file")
  )
)]
#[instrument(skip(state, user, multipart), fields(user_id = %user.id))]
async fn upload_cv(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  multipart: Multipart,
) -> ApiResult<Json<User>> {
  let (file_name, bytes) = read_upload(multipart).await?;

  debug!("Store cv {} ({} bytes)", file_name, bytes.len());

  let url = state.uploads.save(&user.id.to_string(), &file_name, &bytes).await?;
  let user = mutation::users::set_cv_url(&state.pool, user.id, &url).await?;

  Ok(Json(user))
}

#[derive(Debug, Deserialize, IntoParams)]
struct ListUsersParams {
  page: Option<i64>,
  users_per_page: Option<i64>,
}

#[utoipa::path(
  get,
  path = "",
  tag = USERS_TAG,
  params(
    ListUsersParams
  ),
  responses(
    (status = 200, description = "List all users successfully", body = [User]),
    (status = 401, description = "Unauthorized")
  )
)]
#[instrument(skip(state))]
async fn list_users(
  State(state): State<AppState>,
  Query(params): Query<ListUsersParams>,
) -> ApiResult<Json<Vec<User>>> {
  let page = params.page.unwrap_or(1);
  let users_per_page = params.users_per_page.unwrap_or(DEFAULT_PAGE_SIZE);

  let (users, _num_pages) = query::users::list(&state.pool, page, users_per_page).await?;

  Ok(Json(users))
}

fn build_auth_cookie(token: String, max_age: Duration) -> Cookie<'static> {
  Cookie::build((AUTH_COOKIE_NAME, token))
    .path("/")
    .max_age(max_age)
    .same_site(SameSite::Lax)
    .http_only(true)
    .build()
}
