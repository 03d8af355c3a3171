use axum::{
  extract::{DefaultBodyLimit, FromRequest, State},
  http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
  },
  response::IntoResponse,
  routing::get,
  Router,
};
use error::ApiError;
use serde_json::json;
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use handlers::{
  chat::init_chat_routes,
  contributors::init_contributors_routes,
  ideas::init_ideas_routes,
  milestones::init_milestones_routes,
  payments::{init_mpesa_routes, init_swypt_routes},
  projects::init_projects_routes,
  stakes::init_stakes_routes,
  tasks::init_tasks_routes,
  timelines::init_timeline_routes,
  users::init_users_routes,
  verifications::init_verifications_routes,
};
use state::AppState;
use storage::{MAX_UPLOAD_BYTES, UPLOADS_ROUTE};

pub mod availability;
pub mod chain;
pub mod chat;
pub mod config;
pub mod entities;
pub mod error;
pub mod github;
mod handlers;
pub mod mailer;
pub mod progress;
pub mod service;
pub mod state;
pub mod storage;
pub mod verification;
pub mod workers;

pub use handlers::auth::{encode_jwt, AUTH_COOKIE_NAME};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const IMARA_TAG: &str = "imara";
// Multipart framing on top of the largest accepted file.
const BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct AppJson<T>(T);

/// Handle health check requests
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
  let res = sqlx::query("SELECT 1").execute(&*state.pool).await;
  match res {
    Ok(_) => json!({
      "code": "200",
      "success": true,
    })
    .to_string(),
    Err(_) => json!({
      "code": "500",
      "success": false,
    })
    .to_string(),
  }
}

/// Builds the full HTTP application: API routes, uploaded files and Swagger UI.
pub fn router(state: AppState) -> anyhow::Result<Router> {
  let cors = CorsLayer::new()
    .allow_origin(state.settings.cors_origin.parse::<HeaderValue>()?)
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
    .allow_credentials(true)
    .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

  #[derive(OpenApi)]
  #[openapi(
    tags(
      (name = IMARA_TAG, description = "Idea staking and collaboration API")
    )
  )]
  struct ApiDoc;

  let uploads = ServeDir::new(state.uploads.root());
  let ideas_routes = init_ideas_routes(state.clone())
    .merge(init_contributors_routes(state.clone()))
    .merge(init_verifications_routes(state.clone()));
  let projects_routes = init_projects_routes(state.clone()).merge(init_chat_routes(state.clone()));

  let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
    .route("/health", get(health_handler))
    .nest("/api/users", init_users_routes(state.clone()))
    .nest("/api/ideas", ideas_routes)
    .nest("/api/stakes", init_stakes_routes(state.clone()))
    .nest("/api/projects", projects_routes)
    .nest("/api/milestones", init_milestones_routes(state.clone()))
    .nest("/api/tasks", init_tasks_routes(state.clone()))
    .nest("/api/timeline", init_timeline_routes(state.clone()))
    .nest("/api/mpesa", init_mpesa_routes(state.clone()))
    .nest("/api/swypt", init_swypt_routes(state.clone()))
    .layer(DefaultBodyLimit::max(BODY_LIMIT))
    .layer(CookieManagerLayer::new())
    .layer(cors)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
    .split_for_parts();

  Ok(
    router
      .nest_service(UPLOADS_ROUTE, uploads)
      .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api)),
  )
}

pub async fn run(state: AppState, cancel_token: CancellationToken) -> anyhow::Result<()> {
  let server_url = state.settings.server_url();
  let router = router(state)?;

  info!("Starting api server on {}...", server_url);

  let listener = TcpListener::bind(&server_url).await?;
  axum::serve(listener, router.into_make_service())
    .with_graceful_shutdown(Box::pin(async move { cancel_token.cancelled().await }))
    .await?;

  info!("Stopped api server");

  Ok(())
}
