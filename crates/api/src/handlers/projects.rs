use axum::{
  extract::{Path, State},
  middleware::from_fn_with_state,
  Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
  chain::{self, ContractCall, MilestoneAllocation},
  entities::{milestone::Milestone, timeline::Timeline, user::User},
  error::{ApiError, ApiResult},
  handlers::auth::auth_guard,
  progress::{self, ProjectProgress},
  service::{mutation, query},
  state::AppState,
  AppJson,
};

const PROJECTS_TAG: &str = "projects";

/// Read-only views over a project's plan. Ideas become projects once they have a team.
pub fn init_projects_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(list_milestones))
    .routes(routes!(get_progress))
    .routes(routes!(get_timeline))
    .routes(routes!(build_project_transaction))
    .layer(from_fn_with_state(state, auth_guard))
}

#[utoipa::path(
  get,
  path = "/{id}/milestones",
  tag = PROJECTS_TAG,
  responses(
    (status = 200, description = "Milestones with their tasks, by due date", body = [Milestone]),
    (status = 401, description = "Unauthorized")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state), fields(project_id = %id))]
async fn list_milestones(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<Milestone>>> {
  let milestones = query::milestones::list_for_project(&state.pool, id).await?;

  Ok(Json(milestones))
}

#[utoipa::path(
  get,
  path = "/{id}/progress",
  tag = PROJECTS_TAG,
  responses(
    (status = 200, description = "Completion percentage and next due milestone", body = ProjectProgress),
    (status = 404, description = "Project not found")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state), fields(project_id = %id))]
async fn get_progress(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ProjectProgress>> {
  if query::ideas::find_row(&state.pool, id).await?.is_none() {
    return Err(ApiError::ResourceNotFound(id.to_string()));
  }

  let milestones = query::milestones::list_for_project(&state.pool, id).await?;
  let progress = progress::project_progress(&milestones, Utc::now());

  debug!("Project {} is {}% complete", id, progress.percentage);

  Ok(Json(progress))
}

#[utoipa::path(
  get,
  path = "/{id}/timeline",
  tag = PROJECTS_TAG,
  responses(
    (status = 200, description = "First timeline of the project, or null", body = Option<Timeline>),
    (status = 401, description = "Unauthorized")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state), fields(project_id = %id))]
async fn get_timeline(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Option<Timeline>>> {
  let timeline = query::timelines::find_for_project(&state.pool, id).await?;

  Ok(Json(timeline))
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct MilestoneShare {
  milestone_id: Uuid,
  /// Token amount in base units, as a decimal string.
  budget: String,
  recipient: String,
  percentage: u8,
}

/// Project contract call to prepare. Amounts are decimal strings in token base units.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProjectAction {
  CreateProject { amount: String },
  SetMilestones { milestones: Vec<MilestoneShare> },
  CompleteMilestone { milestone_id: Uuid },
  AddFunds { amount: String },
}

/// Unsigned transaction for the caller's wallet to sign and send.
#[derive(Debug, Serialize, ToSchema)]
pub struct UnsignedTransaction {
  to: String,
  data: String,
  chain_id: u64,
}

fn parse_amount(raw: &str) -> ApiResult<u128> {
  match raw.trim().parse::<u128>() {
    Ok(amount) if amount > 0 => Ok(amount),
    _ => Err(ApiError::InvalidInput(format!("`{raw}` is not a token amount"))),
  }
}

async fn ensure_milestone_of(state: &AppState, project_id: Uuid, milestone_id: Uuid) -> ApiResult<()> {
  match query::milestones::find_row(&state.pool, milestone_id).await? {
    Some(milestone) if milestone.project_id == project_id => Ok(()),
    _ => Err(ApiError::ResourceNotFound(format!("milestone {milestone_id} of project {project_id}"))),
  }
}

#[utoipa::path(
  post,
  path = "/{id}/chain/transactions",
  tag = PROJECTS_TAG,
  request_body = ProjectAction,
  responses(
    (status = 200, description = "Calldata for the project contract", body = UnsignedTransaction),
    (status = 400, description = "Invalid amount, recipient or shares"),
    (status = 403, description = "Only the creator can manage the project on chain"),
    (status = 404, description = "Project or milestone not found"),
    (status = 503, description = "No project contract configured")
  ),
  params(
    ("id" = Uuid, Path, description = "Project id")
  )
)]
#[instrument(skip(state, user, action), fields(project_id = %id, user_id = %user.id))]
async fn build_project_transaction(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  AppJson(action): AppJson<ProjectAction>,
) -> ApiResult<Json<UnsignedTransaction>> {
  debug!("Build project transaction {:?}", action);

  let (_, settings) = state.chain().ok_or(ApiError::NotConfigured("Chain"))?;
  let contract = settings
    .project_contract
    .clone()
    .ok_or(ApiError::NotConfigured("Project contract"))?;

  // Anyone may top up a project, everything else is the creator's.
  match action {
    ProjectAction::AddFunds { .. } => {
      query::ideas::find_row(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))?;
    },
    _ => {
      mutation::ideas::ensure_creator(&state.pool, id, user.id).await?;
    },
  }

  let project_id = chain::chain_id_of(id);
  let call = match action {
    ProjectAction::CreateProject { amount } => ContractCall::CreateProjectWithId {
      project_id,
      amount: parse_amount(&amount)?,
    },
    ProjectAction::AddFunds { amount } => ContractCall::AddFunds {
      project_id,
      amount: parse_amount(&amount)?,
    },
    ProjectAction::CompleteMilestone { milestone_id } => {
      ensure_milestone_of(&state, id, milestone_id).await?;
      ContractCall::CompleteMilestone {
        project_id,
        milestone_id: chain::chain_id_of(milestone_id),
      }
    },
    ProjectAction::SetMilestones { milestones } => {
      if milestones.is_empty() {
        return Err(ApiError::InvalidInput("at least one milestone is required".to_string()));
      }
      let total: u32 = milestones.iter().map(|share| u32::from(share.percentage)).sum();
      if total != 100 {
        return Err(ApiError::InvalidInput(format!("milestone percentages add up to {total}, not 100")));
      }

      let mut allocations = Vec::with_capacity(milestones.len());
      for share in milestones {
        ensure_milestone_of(&state, id, share.milestone_id).await?;
        allocations.push(MilestoneAllocation {
          milestone_id: chain::chain_id_of(share.milestone_id),
          budget: parse_amount(&share.budget)?,
          recipient: share.recipient,
          percentage: u128::from(share.percentage),
        });
      }

      ContractCall::SetMilestones {
        project_id,
        milestones: allocations,
      }
    },
  };

  Ok(Json(UnsignedTransaction {
    to: contract,
    data: call.encode()?,
    chain_id: settings.chain_id,
  }))
}
