use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ContributorStatus {
  Pending,
  Approved,
  Rejected,
}

impl fmt::Display for ContributorStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      ContributorStatus::Pending => write!(f, "pending"),
      ContributorStatus::Approved => write!(f, "approved"),
      ContributorStatus::Rejected => write!(f, "rejected"),
    }
  }
}

impl FromStr for ContributorStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(ContributorStatus::Pending),
      "approved" => Ok(ContributorStatus::Approved),
      "rejected" => Ok(ContributorStatus::Rejected),
      _ => Err(format!("'{}' is not a valid variant", s)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StakeStatus {
  Unstaked,
  Staked,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct Contributor {
  pub id: Uuid,
  pub idea_id: Uuid,
  pub user_id: Uuid,
  pub role: String,
  pub status: ContributorStatus,
  pub stake_status: StakeStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Contributor joined with the public parts of its user.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct ContributorView {
  pub id: Uuid,
  pub idea_id: Uuid,
  pub user_id: Uuid,
  pub username: String,
  pub email: Option<String>,
  pub role: String,
  pub status: ContributorStatus,
  pub stake_status: StakeStatus,
  pub created_at: DateTime<Utc>,
}
