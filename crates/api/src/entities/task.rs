use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Progress state shared by milestones and their tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum WorkStatus {
  Pending,
  InProgress,
  Completed,
}

impl fmt::Display for WorkStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      WorkStatus::Pending => write!(f, "pending"),
      WorkStatus::InProgress => write!(f, "in_progress"),
      WorkStatus::Completed => write!(f, "completed"),
    }
  }
}

impl FromStr for WorkStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(WorkStatus::Pending),
      "in_progress" => Ok(WorkStatus::InProgress),
      "completed" => Ok(WorkStatus::Completed),
      _ => Err(format!("'{}' is not a valid variant", s)),
    }
  }
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct Task {
  pub id: Uuid,
  pub milestone_id: Uuid,
  pub title: String,
  pub description: String,
  pub assignee_id: Option<Uuid>,
  pub due_date: Option<NaiveDate>,
  pub status: WorkStatus,
  pub evidence_url: Option<String>,
  pub reviewed: bool,
  pub created_by: Uuid,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
