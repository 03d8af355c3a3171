use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::task::{Task, WorkStatus};

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct MilestoneRow {
  pub id: Uuid,
  pub project_id: Uuid,
  pub title: String,
  pub description: String,
  pub due_date: NaiveDate,
  pub status: WorkStatus,
  pub created_by: Uuid,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Milestone {
  pub id: Uuid,
  pub project_id: Uuid,
  pub title: String,
  pub description: String,
  pub due_date: NaiveDate,
  pub status: WorkStatus,
  pub created_by: Uuid,
  pub tasks: Vec<Task>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Milestone {
  pub fn from_row(row: MilestoneRow, tasks: Vec<Task>) -> Self {
    Self {
      id: row.id,
      project_id: row.project_id,
      title: row.title,
      description: row.description,
      due_date: row.due_date,
      status: row.status,
      created_by: row.created_by,
      tasks,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}
