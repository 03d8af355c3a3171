use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

/// Latest qualification check of a user for a role on one idea.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct Verification {
  pub id: Uuid,
  pub idea_id: Uuid,
  pub user_id: Uuid,
  pub role: String,
  pub cv_checked: bool,
  pub cv_qualified: bool,
  #[schema(value_type = Vec<String>)]
  pub found_skills: Json<Vec<String>>,
  #[schema(value_type = Vec<String>)]
  pub missing_skills: Json<Vec<String>>,
  pub github_username: Option<String>,
  pub github_qualified: bool,
  #[schema(value_type = Vec<String>)]
  pub github_languages: Json<Vec<String>>,
  pub qualified: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Verification {
  pub fn covers(&self, role: &str) -> bool {
    self.qualified && self.role == role.trim()
  }
}
