use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  entities::contributor::{Contributor, ContributorView},
  error::ApiResult,
};

const LIST_CONTRIBUTORS: &str = "SELECT * FROM idea_contributors WHERE idea_id = ?1 ORDER BY created_at, rowid";
const LIST_CONTRIBUTOR_VIEWS: &str = r#"
  SELECT
    c.id, c.idea_id, c.user_id, u.username, u.email, c.role, c.status, c.stake_status, c.created_at
  FROM idea_contributors AS c
  INNER JOIN users AS u ON c.user_id = u.id
  WHERE c.idea_id = ?1
  ORDER BY c.created_at, c.rowid
"#;
const FIND_CONTRIBUTOR: &str = "SELECT * FROM idea_contributors WHERE idea_id = ?1 AND id = ?2";
const FIND_CONTRIBUTOR_BY_USER: &str = "SELECT * FROM idea_contributors WHERE idea_id = ?1 AND user_id = ?2";

pub async fn list(pool: &SqlitePool, idea_id: Uuid) -> ApiResult<Vec<Contributor>> {
  sqlx::query_as::<_, Contributor>(LIST_CONTRIBUTORS)
    .bind(idea_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Contributors of an idea joined with their usernames and emails
pub async fn list_views(pool: &SqlitePool, idea_id: Uuid) -> ApiResult<Vec<ContributorView>> {
  sqlx::query_as::<_, ContributorView>(LIST_CONTRIBUTOR_VIEWS)
    .bind(idea_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn find(pool: &SqlitePool, idea_id: Uuid, id: Uuid) -> ApiResult<Option<Contributor>> {
  sqlx::query_as::<_, Contributor>(FIND_CONTRIBUTOR)
    .bind(idea_id)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn find_by_user(pool: &SqlitePool, idea_id: Uuid, user_id: Uuid) -> ApiResult<Option<Contributor>> {
  sqlx::query_as::<_, Contributor>(FIND_CONTRIBUTOR_BY_USER)
    .bind(idea_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}
