use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
  availability::{required_counts, FILLED_STATUS},
  entities::{
    contributor::{Contributor, ContributorStatus, StakeStatus},
    idea::IdeaRow,
    stake::{Stake, StakeMethod, StakeRecordStatus},
  },
  error::{ApiError, ApiResult},
  service::query,
};

const FIND_STAKE_BY_REFERENCE: &str = "SELECT * FROM stakes WHERE method = ?1 AND reference = ?2";
const INSERT_STAKE: &str = r#"
    INSERT INTO stakes (id, idea_id, user_id, method, reference, amount, token, status, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    RETURNING *
"#;
const ATTACH_STAKE: &str = "UPDATE stakes SET contributor_id = ?1, status = ?2 WHERE id = ?3 RETURNING *";

// Inserts only while the role still has room. A single statement, so concurrent joins cannot
// both observe the last free slot.
const INSERT_CONTRIBUTOR_IF_OPEN: &str = r#"
    INSERT INTO idea_contributors (id, idea_id, user_id, role, status, stake_status, created_at, updated_at)
    SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7
    WHERE (
      SELECT COUNT(*) FROM idea_contributors
      WHERE idea_id = ?2 AND role = ?4 AND status = ?8
    ) < ?9
    RETURNING *
"#;
const APPROVE_CONTRIBUTOR_IF_OPEN: &str = r#"
    UPDATE idea_contributors
    SET status = ?1, updated_at = ?2
    WHERE id = ?3 AND idea_id = ?4 AND (
      SELECT COUNT(*) FROM idea_contributors AS c
      WHERE c.idea_id = ?4 AND c.role = ?5 AND c.status = ?1
    ) < ?6
    RETURNING *
"#;
const UPDATE_CONTRIBUTOR_STATUS: &str = r#"
    UPDATE idea_contributors
    SET status = ?1, updated_at = ?2
    WHERE id = ?3 AND idea_id = ?4
    RETURNING *
"#;

#[derive(Debug, Clone)]
pub struct NewStake {
  pub method: StakeMethod,
  pub reference: String,
  pub amount: String,
  pub token: String,
}

#[derive(Debug, Clone)]
pub struct JoinParams {
  pub user_id: Uuid,
  pub role: String,
  pub stake: NewStake,
}

#[derive(Debug, Clone)]
pub enum JoinOutcome {
  Joined { contributor: Contributor, stake: Stake },
  /// The role filled up. The stake is kept as unclaimed.
  Refused { stake: Stake },
}

/// Records a verified stake and requests a team slot in one transaction
///
/// # Errors
/// - UnknownRole if the role is not part of the idea's resources
/// - AlreadyContributor if the user already requested a slot on this idea
/// - StakeRejected if the stake reference was already used
#[instrument(skip(pool, idea, params), fields(idea_id = %idea.id, user_id = %params.user_id))]
pub async fn join(pool: &SqlitePool, idea: &IdeaRow, params: JoinParams) -> ApiResult<JoinOutcome> {
  let role = params.role.trim().to_string();
  let required = required_for_role(idea, &role)?;

  if query::contributors::find_by_user(pool, idea.id, params.user_id)
    .await?
    .is_some()
  {
    return Err(ApiError::AlreadyContributor(idea.id.to_string()));
  }

  let mut tx = pool.begin().await?;

  let used = sqlx::query_as::<_, Stake>(FIND_STAKE_BY_REFERENCE)
    .bind(params.stake.method)
    .bind(&params.stake.reference)
    .fetch_optional(&mut *tx)
    .await?;
  if used.is_some() {
    return Err(ApiError::StakeRejected(format!(
      "stake reference `{}` was already used",
      params.stake.reference
    )));
  }

  let now = Utc::now();
  let stake = sqlx::query_as::<_, Stake>(INSERT_STAKE)
    .bind(Uuid::new_v4())
    .bind(idea.id)
    .bind(params.user_id)
    .bind(params.stake.method)
    .bind(&params.stake.reference)
    .bind(&params.stake.amount)
    .bind(&params.stake.token)
    .bind(StakeRecordStatus::Unclaimed)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

  let contributor = sqlx::query_as::<_, Contributor>(INSERT_CONTRIBUTOR_IF_OPEN)
    .bind(Uuid::new_v4())
    .bind(idea.id)
    .bind(params.user_id)
    .bind(&role)
    .bind(ContributorStatus::Pending)
    .bind(StakeStatus::Staked)
    .bind(now)
    .bind(FILLED_STATUS)
    .bind(required)
    .fetch_optional(&mut *tx)
    .await?;

  let outcome = match contributor {
    Some(contributor) => {
      let stake = sqlx::query_as::<_, Stake>(ATTACH_STAKE)
        .bind(contributor.id)
        .bind(StakeRecordStatus::Attached)
        .bind(stake.id)
        .fetch_one(&mut *tx)
        .await?;

      info!("User {} requested role {} on idea {}", params.user_id, role, idea.id);
      JoinOutcome::Joined { contributor, stake }
    },
    None => {
      info!("Role {} on idea {} is full, stake {} left unclaimed", role, idea.id, stake.id);
      JoinOutcome::Refused { stake }
    },
  };

  tx.commit().await?;

  Ok(outcome)
}

/// Moves a contributor to `status`. Approval only succeeds while the role has a free slot.
#[instrument(skip(pool, idea), fields(idea_id = %idea.id))]
pub async fn set_status(
  pool: &SqlitePool,
  idea: &IdeaRow,
  contributor_id: Uuid,
  status: ContributorStatus,
) -> ApiResult<Contributor> {
  let current = query::contributors::find(pool, idea.id, contributor_id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(contributor_id.to_string()))?;

  if current.status == status {
    return Ok(current);
  }

  let now = Utc::now();

  if status != FILLED_STATUS {
    return sqlx::query_as::<_, Contributor>(UPDATE_CONTRIBUTOR_STATUS)
      .bind(status)
      .bind(now)
      .bind(contributor_id)
      .bind(idea.id)
      .fetch_one(pool)
      .await
      .map_err(Into::into);
  }

  let required = required_for_role(idea, &current.role)?;

  debug!("Approve contributor {} for role {} (capacity {})", contributor_id, current.role, required);

  let approved = sqlx::query_as::<_, Contributor>(APPROVE_CONTRIBUTOR_IF_OPEN)
    .bind(FILLED_STATUS)
    .bind(now)
    .bind(contributor_id)
    .bind(idea.id)
    .bind(&current.role)
    .bind(required)
    .fetch_optional(pool)
    .await?;

  approved.ok_or(ApiError::RoleUnavailable(current.role))
}

pub(crate) fn required_for_role(idea: &IdeaRow, role: &str) -> ApiResult<i64> {
  let resources = idea.resources().map_err(|e| ApiError::Anyhow(e.into()))?;

  required_counts(&resources)
    .into_iter()
    .find(|(name, _)| name == role.trim())
    .map(|(_, count)| i64::from(count))
    .ok_or_else(|| ApiError::UnknownRole(role.to_string()))
}
