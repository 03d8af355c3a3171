use chrono::Utc;
use imara_swypt::{OrderGateway, PollOutcome};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  entities::payment::{PaymentOrder, PaymentStatus},
  error::{ApiError, ApiResult},
};

const INSERT_ORDER: &str = r#"
  INSERT INTO payment_orders (order_id, user_id, idea_id, phone, amount, status, message, created_at, updated_at)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
  RETURNING *
"#;

// Terminal orders are never touched again.
const RECORD_ATTEMPT: &str = r#"
  UPDATE payment_orders
  SET attempts = attempts + 1, message = ?1, updated_at = ?2
  WHERE order_id = ?3 AND status = ?4
  RETURNING *
"#;
const FINISH_ORDER: &str = r#"
  UPDATE payment_orders
  SET status = ?1, transfer_hash = COALESCE(?2, transfer_hash), message = ?3, updated_at = ?4
  WHERE order_id = ?5 AND status = ?6
  RETURNING *
"#;
// Whoever moves the row out of `pending` is the only caller allowed to transfer.
const CLAIM_ORDER: &str = r#"
  UPDATE payment_orders
  SET status = ?1, updated_at = ?2
  WHERE order_id = ?3 AND status = ?4
  RETURNING *
"#;
const RELEASE_CLAIM: &str = r#"
  UPDATE payment_orders
  SET status = ?1, attempts = attempts + 1, message = ?2, updated_at = ?3
  WHERE order_id = ?4 AND status = ?5
  RETURNING *
"#;

#[derive(Debug, Clone)]
pub struct CreateOrderParams {
  pub order_id: String,
  pub user_id: Uuid,
  pub idea_id: Option<Uuid>,
  pub phone: String,
  pub amount: i64,
  pub message: Option<String>,
}

pub async fn create(pool: &SqlitePool, params: CreateOrderParams) -> ApiResult<PaymentOrder> {
  sqlx::query_as::<_, PaymentOrder>(INSERT_ORDER)
    .bind(&params.order_id)
    .bind(params.user_id)
    .bind(params.idea_id)
    .bind(&params.phone)
    .bind(params.amount)
    .bind(PaymentStatus::Pending)
    .bind(&params.message)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

/// Counts one more unsuccessful status check. `None` when the order is no longer pending.
pub async fn record_attempt(pool: &SqlitePool, order_id: &str, message: &str) -> ApiResult<Option<PaymentOrder>> {
  sqlx::query_as::<_, PaymentOrder>(RECORD_ATTEMPT)
    .bind(message)
    .bind(Utc::now())
    .bind(order_id)
    .bind(PaymentStatus::Pending)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Moves a pending order to a terminal `status`. `None` when it was already taken.
pub async fn finish(
  pool: &SqlitePool,
  order_id: &str,
  status: PaymentStatus,
  transfer_hash: Option<&str>,
  message: &str,
) -> ApiResult<Option<PaymentOrder>> {
  transition(pool, order_id, PaymentStatus::Pending, status, transfer_hash, message).await
}

async fn transition(
  pool: &SqlitePool,
  order_id: &str,
  from: PaymentStatus,
  to: PaymentStatus,
  transfer_hash: Option<&str>,
  message: &str,
) -> ApiResult<Option<PaymentOrder>> {
  if !to.is_terminal() {
    return Err(ApiError::InvalidStatus(to.to_string()));
  }

  sqlx::query_as::<_, PaymentOrder>(FINISH_ORDER)
    .bind(to)
    .bind(transfer_hash)
    .bind(message)
    .bind(Utc::now())
    .bind(order_id)
    .bind(from)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Moves a pending order to `settling`. `None` when another caller got there first.
pub async fn claim(pool: &SqlitePool, order_id: &str) -> ApiResult<Option<PaymentOrder>> {
  sqlx::query_as::<_, PaymentOrder>(CLAIM_ORDER)
    .bind(PaymentStatus::Settling)
    .bind(Utc::now())
    .bind(order_id)
    .bind(PaymentStatus::Pending)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Hands a claimed order back to `pending`, counting the failed transfer as an attempt.
pub async fn release(pool: &SqlitePool, order_id: &str, message: &str) -> ApiResult<Option<PaymentOrder>> {
  sqlx::query_as::<_, PaymentOrder>(RELEASE_CLAIM)
    .bind(PaymentStatus::Pending)
    .bind(message)
    .bind(Utc::now())
    .bind(order_id)
    .bind(PaymentStatus::Settling)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Claims a paid order and releases its on-ramped tokens.
///
/// Returns `None` without calling the gateway when the order is not `pending`. A failed transfer
/// puts the order back to `pending` so it can be retried.
pub async fn transfer<G>(pool: &SqlitePool, gateway: &G, order_id: &str) -> ApiResult<Option<PaymentOrder>>
where
  G: OrderGateway + ?Sized,
{
  if claim(pool, order_id).await?.is_none() {
    return Ok(None);
  }

  match gateway.crypto_transfer(order_id).await {
    Ok(receipt) => {
      info!("Payment order {} settled with transfer {}", order_id, receipt.hash);

      transition(
        pool,
        order_id,
        PaymentStatus::Settling,
        PaymentStatus::Success,
        Some(&receipt.hash),
        &receipt.message,
      )
      .await
    },
    Err(e) => {
      warn!("Crypto transfer of payment order {} failed: {}", order_id, e);
      release(pool, order_id, &e.to_string()).await?;

      Err(e.into())
    },
  }
}

/// Records a final poll outcome on the order. `None` when another caller already handled it.
pub async fn apply_outcome<G>(
  pool: &SqlitePool,
  gateway: &G,
  order_id: &str,
  outcome: &PollOutcome,
) -> ApiResult<Option<PaymentOrder>>
where
  G: OrderGateway + ?Sized,
{
  match outcome {
    PollOutcome::Paid(_) => transfer(pool, gateway, order_id).await,
    PollOutcome::Failed(status) => finish(pool, order_id, PaymentStatus::Failed, None, &status.message).await,
    PollOutcome::Cancelled(status) => finish(pool, order_id, PaymentStatus::Cancelled, None, &status.message).await,
  }
}
