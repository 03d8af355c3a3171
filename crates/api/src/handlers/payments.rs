use axum::{
  extract::{Path, State},
  http::StatusCode,
  middleware::from_fn_with_state,
  Extension, Json,
};
use imara_swypt::{normalize_phone, OrderGateway, OrderState, PaymentPoller, QuoteRequest, SwyptError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  entities::{payment::PaymentOrder, user::User},
  error::{ApiError, ApiResult},
  handlers::auth::auth_guard,
  service::{mutation, query},
  state::AppState,
  AppJson,
};

const PAYMENTS_TAG: &str = "payments";

pub fn init_mpesa_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(initiate_payment))
    .routes(routes!(payment_status))
    .routes(routes!(await_payment))
    .layer(from_fn_with_state(state, auth_guard))
}

pub fn init_swypt_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(crypto_transfer))
    .routes(routes!(quote))
    .routes(routes!(offramp_quote))
    .routes(routes!(supported_assets))
    .layer(from_fn_with_state(state, auth_guard))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct InitiatePayment {
  #[validate(length(min = 9, max = 15))]
  phone: String,
  /// Amount in KES.
  #[validate(range(min = 1, max = 250_000))]
  amount: u64,
  /// Idea the payment stakes for, when known up front.
  idea_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitiatePaymentResponse {
  order_id: String,
  message: String,
  order: PaymentOrder,
}

#[utoipa::path(
  post,
  path = "/initiate",
  tag = PAYMENTS_TAG,
  request_body = InitiatePayment,
  responses(
    (status = 201, description = "STK push sent, order recorded as pending", body = InitiatePaymentResponse),
    (status = 502, description = "Payment aggregator rejected the request"),
    (status = 503, description = "Payment aggregator not configured")
  )
)]
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn initiate_payment(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  AppJson(input): AppJson<InitiatePayment>,
) -> ApiResult<(StatusCode, Json<InitiatePaymentResponse>)> {
  input.validate()?;

  let swypt = state.swypt()?;
  let phone = normalize_phone(&input.phone);

  debug!("Initiate on-ramp of {} KES from {}", input.amount, phone);

  let onramp = swypt.initiate_onramp(&phone, input.amount).await?;

  let amount =
    i64::try_from(input.amount).map_err(|_| ApiError::InvalidInput(format!("amount {} is too large", input.amount)))?;

  let order = mutation::payments::create(
    &state.pool,
    mutation::payments::CreateOrderParams {
      order_id: onramp.order_id.clone(),
      user_id: user.id,
      idea_id: input.idea_id,
      phone,
      amount,
      message: Some(onramp.message.clone()),
    },
  )
  .await?;

  info!("Payment order {} recorded for user {}", order.order_id, user.id);

  Ok((
    StatusCode::CREATED,
    Json(InitiatePaymentResponse {
      order_id: onramp.order_id,
      message: onramp.message,
      order,
    }),
  ))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusResponse {
  /// `SUCCESS`, `FAILED`, `CANCELLED` or `PENDING` as reported by the aggregator.
  #[schema(value_type = String)]
  status: OrderState,
  message: String,
  #[schema(value_type = Option<Object>)]
  details: Option<Value>,
  /// Locally tracked order, when it was initiated through this API.
  order: Option<PaymentOrder>,
}

#[utoipa::path(
  get,
  path = "/status/{order_id}",
  tag = PAYMENTS_TAG,
  responses(
    (status = 200, description = "Live order status", body = PaymentStatusResponse),
    (status = 403, description = "Order belongs to another user"),
    (status = 502, description = "Payment aggregator error")
  ),
  params(
    ("order_id" = String, Path, description = "Aggregator order id")
  )
)]
#[instrument(skip(state, user), fields(order_id = %order_id))]
async fn payment_status(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(order_id): Path<String>,
) -> ApiResult<Json<PaymentStatusResponse>> {
  let swypt = state.swypt()?;

  let order = query::payments::find(&state.pool, &order_id).await?;
  if order.as_ref().is_some_and(|order| order.user_id != user.id) {
    return Err(ApiError::Forbidden(format!("Payment order `{order_id}` belongs to another user")));
  }

  let live = swypt.order_status(&order_id).await?;

  Ok(Json(PaymentStatusResponse {
    status: live.status,
    message: live.message,
    details: live.details,
    order,
  }))
}

#[utoipa::path(
  get,
  path = "/await/{order_id}",
  tag = PAYMENTS_TAG,
  responses(
    (status = 200, description = "Order after polling; still `pending` when the aggregator never confirmed it", body = PaymentOrder),
    (status = 403, description = "Order belongs to another user"),
    (status = 404, description = "Order was not initiated through this API"),
    (status = 502, description = "Payment aggregator error")
  ),
  params(
    ("order_id" = String, Path, description = "Aggregator order id")
  )
)]
#[instrument(skip(state, user), fields(order_id = %order_id))]
async fn await_payment(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(order_id): Path<String>,
) -> ApiResult<Json<PaymentOrder>> {
  let swypt = state.swypt()?;

  let order = query::payments::find(&state.pool, &order_id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(order_id.clone()))?;
  if order.user_id != user.id {
    return Err(ApiError::Forbidden(format!("Payment order `{order_id}` belongs to another user")));
  }
  if order.status.is_terminal() {
    return Ok(Json(order));
  }

  match PaymentPoller::default().poll(swypt, &order_id, &state.cancel_token).await {
    Ok(outcome) => {
      mutation::payments::apply_outcome(&state.pool, swypt, &order_id, &outcome).await?;
    },
    Err(SwyptError::Timeout(attempts)) => debug!("Order {} still pending after {} checks", order_id, attempts),
    Err(e) => return Err(e.into()),
  }

  // Settlement workers may have claimed or finished it first.
  let order = query::payments::find(&state.pool, &order_id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(order_id.clone()))?;

  Ok(Json(order))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct CryptoTransfer {
  #[validate(length(min = 1))]
  order_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CryptoTransferResponse {
  hash: String,
  message: String,
}

#[utoipa::path(
  post,
  path = "/crypto-transfer",
  tag = PAYMENTS_TAG,
  request_body = CryptoTransfer,
  responses(
    (status = 200, description = "On-ramped tokens released", body = CryptoTransferResponse),
    (status = 403, description = "Order belongs to another user"),
    (status = 404, description = "Order was not initiated through this API"),
    (status = 409, description = "Order is already settling or finished"),
    (status = 502, description = "Payment aggregator error")
  )
)]
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn crypto_transfer(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  AppJson(input): AppJson<CryptoTransfer>,
) -> ApiResult<Json<CryptoTransferResponse>> {
  input.validate()?;

  let swypt = state.swypt()?;
  let order_id = input.order_id;

  let order = query::payments::find(&state.pool, &order_id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(order_id.clone()))?;
  if order.user_id != user.id {
    return Err(ApiError::Forbidden(format!("Payment order `{order_id}` belongs to another user")));
  }

  let order = mutation::payments::transfer(&state.pool, swypt, &order_id)
    .await?
    .ok_or_else(|| ApiError::OrderNotTransferable(order_id.clone()))?;

  Ok(Json(CryptoTransferResponse {
    hash: order.transfer_hash.unwrap_or_default(),
    message: order.message.unwrap_or_default(),
  }))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteInput {
  /// `onramp` or `offramp`.
  #[validate(length(min = 1))]
  r#type: String,
  #[validate(length(min = 1))]
  amount: String,
  #[validate(length(min = 1))]
  fiat_currency: String,
  #[validate(length(min = 1))]
  crypto_currency: String,
  #[validate(length(min = 1))]
  network: String,
  category: Option<String>,
}

impl From<QuoteInput> for QuoteRequest {
  fn from(input: QuoteInput) -> Self {
    Self {
      r#type: input.r#type,
      amount: input.amount,
      fiat_currency: input.fiat_currency,
      crypto_currency: input.crypto_currency,
      network: input.network,
      category: input.category,
    }
  }
}

#[utoipa::path(
  post,
  path = "/quotes",
  tag = PAYMENTS_TAG,
  request_body = QuoteInput,
  responses(
    (status = 200, description = "Quote as returned by the aggregator", body = Object),
    (status = 502, description = "Payment aggregator error")
  )
)]
#[instrument(skip(state))]
async fn quote(State(state): State<AppState>, AppJson(input): AppJson<QuoteInput>) -> ApiResult<Json<Value>> {
  input.validate()?;

  let quote = state.swypt()?.quote(&input.into()).await?;

  Ok(Json(quote))
}

#[utoipa::path(
  post,
  path = "/offramp",
  tag = PAYMENTS_TAG,
  request_body = QuoteInput,
  responses(
    (status = 200, description = "Off-ramp quote as returned by the aggregator", body = Object),
    (status = 502, description = "Payment aggregator error")
  )
)]
#[instrument(skip(state))]
async fn offramp_quote(State(state): State<AppState>, AppJson(input): AppJson<QuoteInput>) -> ApiResult<Json<Value>> {
  input.validate()?;

  let quote = state.swypt()?.offramp_quote(&input.into()).await?;

  Ok(Json(quote))
}

#[utoipa::path(
  get,
  path = "/supported-assets",
  tag = PAYMENTS_TAG,
  responses(
    (status = 200, description = "Assets and networks supported by the aggregator", body = Object),
    (status = 502, description = "Payment aggregator error")
  )
)]
#[instrument(skip(state))]
async fn supported_assets(State(state): State<AppState>) -> ApiResult<Json<Value>> {
  let assets = state.swypt()?.supported_assets().await?;

  Ok(Json(assets))
}
