use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StakeMethod {
  Crypto,
  Mpesa,
}

/// `Unclaimed` stakes were paid but could not be attached to a team slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StakeRecordStatus {
  Attached,
  Unclaimed,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct Stake {
  pub id: Uuid,
  pub idea_id: Uuid,
  pub user_id: Uuid,
  pub contributor_id: Option<Uuid>,
  pub method: StakeMethod,
  /// Transaction hash for crypto stakes, on-ramp order id for M-Pesa stakes.
  pub reference: String,
  pub amount: String,
  pub token: String,
  pub status: StakeRecordStatus,
  pub created_at: DateTime<Utc>,
}
