use axum::{
  extract::{Path, State},
  http::StatusCode,
  middleware::from_fn_with_state,
  Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  chain,
  chat::ChatEvent,
  entities::{
    contributor::{Contributor, ContributorStatus, ContributorView},
    idea::IdeaRow,
    payment::PaymentStatus,
    stake::{Stake, StakeMethod},
    user::User,
  },
  error::{ApiError, ApiResult},
  handlers::auth::auth_guard,
  mailer::StakeConfirmation,
  service::{
    mutation::{
      self,
      contributors::{JoinOutcome, JoinParams, NewStake},
    },
    query,
  },
  state::AppState,
  AppJson,
};

const CONTRIBUTORS_TAG: &str = "contributors";

pub fn init_contributors_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(list_contributors, join_idea))
    .routes(routes!(moderate_contributor))
    .layer(from_fn_with_state(state, auth_guard))
}

#[utoipa::path(
  get,
  path = "/{id}/contributors",
  tag = CONTRIBUTORS_TAG,
  responses(
    (status = 200, description = "Contributors of an idea", body = [ContributorView]),
    (status = 401, description = "Unauthorized")
  ),
  params(
    ("id" = Uuid, Path, description = "Idea id")
  )
)]
#[instrument(skip(state), fields(idea_id = %id))]
async fn list_contributors(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ContributorView>>> {
  let contributors = query::contributors::list_views(&state.pool, id).await?;

  Ok(Json(contributors))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct StakeProof {
  method: StakeMethod,
  /// Transaction hash for crypto stakes, on-ramp order id for M-Pesa stakes.
  #[validate(length(min = 1))]
  reference: String,
  #[validate(length(min = 1))]
  amount: String,
  #[validate(length(min = 1))]
  token: String,
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct JoinRequest {
  #[validate(length(min = 1))]
  role: String,
  #[validate(nested)]
  stake: StakeProof,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
  contributor: Contributor,
  stake: Stake,
}

#[utoipa::path(
  post,
  path = "/{id}/contributors",
  tag = CONTRIBUTORS_TAG,
  request_body = JoinRequest,
  responses(
    (status = 201, description = "Slot requested, stake attached", body = JoinResponse),
    (status = 400, description = "Stake could not be verified"),
    (status = 403, description = "User is not verified for the role"),
    (status = 404, description = "Idea not found"),
    (status = 409, description = "Role unknown, full, or user already joined")
  ),
  params(
    ("id" = Uuid, Path, description = "Idea id")
  )
)]
#[instrument(skip(state, user, input), fields(idea_id = %id, user_id = %user.id))]
async fn join_idea(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<JoinRequest>,
) -> ApiResult<(StatusCode, Json<JoinResponse>)> {
  debug!("Join idea {} with request {:?}", id, input);

  input.validate()?;

  let idea = query::ideas::find_row(&state.pool, id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))?;

  let role = input.role.trim().to_string();
  mutation::contributors::required_for_role(&idea, &role)?;

  let verified = query::verifications::find(&state.pool, idea.id, user.id)
    .await?
    .is_some_and(|verification| verification.covers(&role));
  if !verified {
    return Err(ApiError::NotVerified(role));
  }

  verify_stake(&state, &user, &idea, &input.stake).await?;

  let params = JoinParams {
    user_id: user.id,
    role: role.clone(),
    stake: NewStake {
      method: input.stake.method,
      reference: input.stake.reference,
      amount: input.stake.amount,
      token: input.stake.token,
    },
  };

  match mutation::contributors::join(&state.pool, &idea, params).await? {
    JoinOutcome::Joined { contributor, stake } => {
      announce_join(&state, &user, &idea, &contributor, &stake).await;

      Ok((StatusCode::CREATED, Json(JoinResponse { contributor, stake })))
    },
    JoinOutcome::Refused { stake } => {
      warn!("Stake {} of user {} left unclaimed on idea {}", stake.id, user.id, idea.id);

      Err(ApiError::RoleUnavailable(role))
    },
  }
}

async fn verify_stake(state: &AppState, user: &User, idea: &IdeaRow, stake: &StakeProof) -> ApiResult<()> {
  match stake.method {
    StakeMethod::Mpesa => {
      let order = query::payments::find(&state.pool, &stake.reference)
        .await?
        .ok_or_else(|| ApiError::StakeRejected(format!("unknown payment order `{}`", stake.reference)))?;

      if order.user_id != user.id {
        return Err(ApiError::StakeRejected("payment order belongs to another user".to_string()));
      }
      if order.idea_id.is_some_and(|idea_id| idea_id != idea.id) {
        return Err(ApiError::StakeRejected("payment order was made for another idea".to_string()));
      }
      if order.status != PaymentStatus::Success {
        return Err(ApiError::StakeRejected(format!("payment order is {}", order.status)));
      }
    },
    StakeMethod::Crypto => {
      if !chain::is_transaction_hash(&stake.reference) {
        return Err(ApiError::StakeRejected(format!(
          "`{}` is not a transaction hash",
          stake.reference
        )));
      }

      let Some((client, settings)) = state.chain() else {
        debug!("No chain RPC configured, accepting transaction {} as submitted", stake.reference);
        return Ok(());
      };

      let wallet = user
        .wallet_address
        .as_deref()
        .ok_or_else(|| ApiError::StakeRejected("link a wallet address to your profile first".to_string()))?;

      let transaction = client
        .transaction(&stake.reference)
        .await?
        .ok_or_else(|| ApiError::StakeRejected("transaction is not mined yet".to_string()))?;

      if !transaction.succeeded {
        return Err(ApiError::StakeRejected("transaction reverted".to_string()));
      }
      if !transaction.sent_to(&settings.stake_contract) {
        return Err(ApiError::StakeRejected("transaction was not sent to the staking contract".to_string()));
      }
      if !transaction.sent_from(wallet) {
        return Err(ApiError::StakeRejected("transaction was sent from another wallet".to_string()));
      }
      if chain::stake_function(&transaction.input).is_none() {
        return Err(ApiError::StakeRejected("transaction is not a stake deposit".to_string()));
      }
    },
  }

  Ok(())
}

async fn announce_join(state: &AppState, user: &User, idea: &IdeaRow, contributor: &Contributor, stake: &Stake) {
  let text = format!("{} joined as {}", user.username, contributor.role);

  match mutation::chat::post_system_message(&state.pool, idea.id, &text).await {
    Ok(message) => state.chat.publish(ChatEvent::Message(message)),
    Err(e) => warn!("Can't post join message for idea {}: {}", idea.id, e),
  }

  let Some(to_email) = user.email.clone() else {
    return;
  };

  let confirmation = StakeConfirmation {
    to_email,
    project_id: idea.id,
    project_title: idea.title.clone(),
    amount: stake.amount.clone(),
    token: stake.token.clone(),
    transaction_hash: stake.reference.clone(),
    sent_at: Utc::now(),
  };

  let mailer = state.mailer.clone();
  tokio::spawn(async move {
    if !mailer.send_stake_confirmation(confirmation).await {
      warn!("Stake confirmation email was not delivered");
    }
  });
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ModerateContributor {
  status: String,
}

#[utoipa::path(
  patch,
  path = "/{id}/contributors/{contributor_id}",
  tag = CONTRIBUTORS_TAG,
  request_body = ModerateContributor,
  responses(
    (status = 200, description = "Contributor status changed", body = Contributor),
    (status = 400, description = "Unknown status"),
    (status = 403, description = "Only the creator can moderate contributors"),
    (status = 409, description = "Role is already full")
  ),
  params(
    ("id" = Uuid, Path, description = "Idea id"),
    ("contributor_id" = Uuid, Path, description = "Contributor id")
  )
)]
#[instrument(skip(state, user), fields(idea_id = %id, contributor_id = %contributor_id))]
async fn moderate_contributor(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path((id, contributor_id)): Path<(Uuid, Uuid)>,
  AppJson(input): AppJson<ModerateContributor>,
) -> ApiResult<Json<Contributor>> {
  let status = input
    .status
    .parse::<ContributorStatus>()
    .map_err(|_| ApiError::InvalidStatus(input.status.clone()))?;

  let idea = mutation::ideas::ensure_creator(&state.pool, id, user.id).await?;

  let contributor = mutation::contributors::set_status(&state.pool, &idea, contributor_id, status).await?;

  info!("Contributor {} of idea {} is now {}", contributor_id, id, status);

  Ok(Json(contributor))
}
