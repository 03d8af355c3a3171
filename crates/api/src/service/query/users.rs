use sqlx::SqlitePool;
use uuid::Uuid;

use super::{calculate_total_pages, page_bounds, page_offset};
use crate::{entities::user::User, error::ApiResult};

const LIST_USERS_QUERY: &str = "SELECT * FROM users ORDER BY created_at, username LIMIT ? OFFSET ?";
const FIND_USER_BY_ID_QUERY: &str = "SELECT * FROM users WHERE id = ?1";
const COUNT_USERS_QUERY: &str = "SELECT COUNT(*) FROM users";

/// Lists users with pagination
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `page` - Page number (1-based)
/// * `limit` - Number of items per page
///
/// # Returns
/// A tuple containing the users and total number of pages
pub async fn list(pool: &SqlitePool, page: i64, limit: i64) -> ApiResult<(Vec<User>, i64)> {
  let (page, limit) = page_bounds(page, limit);
  let (total_count, users) = tokio::try_join!(get_total_count(pool), fetch_paginated_users(pool, page, limit))?;

  let total_pages = calculate_total_pages(total_count, limit);
  Ok((users, total_pages))
}

/// Finds a user by their ID
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> ApiResult<Option<User>> {
  sqlx::query_as::<_, User>(FIND_USER_BY_ID_QUERY)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

async fn get_total_count(pool: &SqlitePool) -> ApiResult<i64> {
  let (count,): (i64,) = sqlx::query_as(COUNT_USERS_QUERY).fetch_one(pool).await?;
  Ok(count)
}

async fn fetch_paginated_users(pool: &SqlitePool, page: i64, limit: i64) -> ApiResult<Vec<User>> {
  let offset = page_offset(page, limit);

  sqlx::query_as::<_, User>(LIST_USERS_QUERY)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}
