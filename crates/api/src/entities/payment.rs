use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
  Pending,
  /// Paid and claimed by one caller for the crypto transfer.
  Settling,
  Success,
  Failed,
  Cancelled,
  TimedOut,
}

impl PaymentStatus {
  pub fn is_terminal(self) -> bool {
    !matches!(self, PaymentStatus::Pending | PaymentStatus::Settling)
  }
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      PaymentStatus::Pending => write!(f, "pending"),
      PaymentStatus::Settling => write!(f, "settling"),
      PaymentStatus::Success => write!(f, "success"),
      PaymentStatus::Failed => write!(f, "failed"),
      PaymentStatus::Cancelled => write!(f, "cancelled"),
      PaymentStatus::TimedOut => write!(f, "timed_out"),
    }
  }
}

/// M-Pesa on-ramp order tracked until the aggregator reports a final state.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct PaymentOrder {
  pub order_id: String,
  pub user_id: Uuid,
  pub idea_id: Option<Uuid>,
  pub phone: String,
  pub amount: i64,
  pub status: PaymentStatus,
  pub attempts: i64,
  pub transfer_hash: Option<String>,
  pub message: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
