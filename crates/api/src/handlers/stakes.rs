use axum::{extract::State, middleware::from_fn_with_state, Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use validator::{Validate, ValidationError};

use crate::{
  chain::{self, PermitRequest, PermitTypedData},
  entities::user::User,
  error::{ApiError, ApiResult},
  handlers::auth::auth_guard,
  state::AppState,
  AppJson,
};

const STAKES_TAG: &str = "stakes";

pub fn init_stakes_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(build_permit))
    .layer(from_fn_with_state(state, auth_guard))
}

fn validate_address(value: &str) -> Result<(), ValidationError> {
  if chain::is_address(value) {
    Ok(())
  } else {
    Err(ValidationError::new("address"))
  }
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct PermitInput {
  #[validate(custom(function = "validate_address"))]
  owner: String,
  /// Defaults to the staking contract.
  #[validate(custom(function = "validate_address"))]
  spender: Option<String>,
  /// Token amount in base units, as a decimal string.
  value: String,
  /// Unix timestamp. Defaults to now plus the configured permit lifetime.
  deadline: Option<i64>,
}

#[utoipa::path(
  post,
  path = "/permit",
  tag = STAKES_TAG,
  request_body = PermitInput,
  responses(
    (status = 200, description = "EIP-712 typed data ready for signing", body = PermitTypedData),
    (status = 400, description = "Invalid input or insufficient balance"),
    (status = 503, description = "No chain configured")
  )
)]
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn build_permit(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  AppJson(input): AppJson<PermitInput>,
) -> ApiResult<Json<PermitTypedData>> {
  debug!("Build permit with params {:?}", input);

  input.validate()?;

  let value = input
    .value
    .trim()
    .parse::<u128>()
    .map_err(|_| ApiError::InvalidInput(format!("`{}` is not a token amount", input.value)))?;

  let (client, settings) = state.chain().ok_or(ApiError::NotConfigured("Chain"))?;

  let (nonce, balance) = tokio::try_join!(
    client.nonce_of(&settings.token_address, &input.owner),
    client.balance_of(&settings.token_address, &input.owner),
  )?;

  if balance < value {
    return Err(ApiError::InvalidInput("insufficient balance".to_string()));
  }

  let deadline = input
    .deadline
    .unwrap_or_else(|| Utc::now().timestamp() + state.settings.permit_ttl_secs);

  let request = PermitRequest {
    owner: input.owner,
    spender: input.spender.unwrap_or_else(|| settings.stake_contract.clone()),
    value,
    nonce,
    deadline,
  };

  Ok(Json(chain::permit_typed_data(chain::permit_domain(settings), &request)))
}
