use chrono::Utc;
use sqlx::{types::Json, SqlitePool};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
  entities::verification::Verification,
  error::ApiResult,
  verification::{CvCheck, GithubCheck},
};

// One record per user and idea. A new check replaces the previous one.
const UPSERT_VERIFICATION: &str = r#"
    INSERT INTO contributor_verifications (
      id, idea_id, user_id, role, cv_checked, cv_qualified, found_skills, missing_skills,
      github_username, github_qualified, github_languages, qualified, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
    ON CONFLICT (idea_id, user_id) DO UPDATE SET
      role = excluded.role,
      cv_checked = excluded.cv_checked,
      cv_qualified = excluded.cv_qualified,
      found_skills = excluded.found_skills,
      missing_skills = excluded.missing_skills,
      github_username = excluded.github_username,
      github_qualified = excluded.github_qualified,
      github_languages = excluded.github_languages,
      qualified = excluded.qualified,
      updated_at = excluded.updated_at
    RETURNING *
"#;

#[derive(Debug, Clone)]
pub struct VerificationParams {
  pub idea_id: Uuid,
  pub user_id: Uuid,
  pub role: String,
  pub cv: Option<CvCheck>,
  pub github: Option<(String, GithubCheck)>,
}

/// Stores the outcome of a qualification check. Either check passing qualifies the user.
#[instrument(skip(pool, params), fields(idea_id = %params.idea_id, user_id = %params.user_id))]
pub async fn record(pool: &SqlitePool, params: VerificationParams) -> ApiResult<Verification> {
  let cv_checked = params.cv.is_some();
  let cv_qualified = params.cv.as_ref().is_some_and(|cv| cv.qualified);
  let github_qualified = params.github.as_ref().is_some_and(|(_, github)| github.qualified);
  let (found, missing) = params.cv.map(|cv| (cv.found, cv.missing)).unwrap_or_default();
  let (github_username, languages) = match params.github {
    Some((username, github)) => (Some(username), github.languages),
    None => (None, Vec::new()),
  };

  let verification = sqlx::query_as::<_, Verification>(UPSERT_VERIFICATION)
    .bind(Uuid::new_v4())
    .bind(params.idea_id)
    .bind(params.user_id)
    .bind(&params.role)
    .bind(cv_checked)
    .bind(cv_qualified)
    .bind(Json(found))
    .bind(Json(missing))
    .bind(github_username)
    .bind(github_qualified)
    .bind(Json(languages))
    .bind(cv_qualified || github_qualified)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

  info!(
    "Verification of user {} for role `{}` recorded, qualified: {}",
    verification.user_id, verification.role, verification.qualified
  );

  Ok(verification)
}
