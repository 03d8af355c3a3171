use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct Timeline {
  pub id: Uuid,
  pub project_id: Uuid,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub description: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
