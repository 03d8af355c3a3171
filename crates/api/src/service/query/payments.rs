use sqlx::SqlitePool;

use crate::{
  entities::payment::{PaymentOrder, PaymentStatus},
  error::ApiResult,
};

const FIND_ORDER: &str = "SELECT * FROM payment_orders WHERE order_id = ?1";
const LIST_ORDERS_BY_STATUS: &str = "SELECT * FROM payment_orders WHERE status = ?1 ORDER BY updated_at LIMIT ?2";

pub async fn find(pool: &SqlitePool, order_id: &str) -> ApiResult<Option<PaymentOrder>> {
  sqlx::query_as::<_, PaymentOrder>(FIND_ORDER)
    .bind(order_id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Pending orders, least recently checked first
pub async fn list_pending(pool: &SqlitePool, limit: i64) -> ApiResult<Vec<PaymentOrder>> {
  sqlx::query_as::<_, PaymentOrder>(LIST_ORDERS_BY_STATUS)
    .bind(PaymentStatus::Pending)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}
