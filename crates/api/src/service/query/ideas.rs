use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{calculate_total_pages, page_bounds, page_offset};
use crate::{
  entities::{
    idea::{decode_resources, Idea, IdeaRow},
    user::User,
  },
  error::ApiResult,
};

const IDEA_WITH_CREATOR_COLUMNS: &str = r#"
  SELECT
    i.id as idea_id,
    i.title as idea_title,
    i.problem_statement as idea_problem_statement,
    i.solution as idea_solution,
    i.project_description as idea_project_description,
    i.image_url as idea_image_url,
    i.resources as idea_resources,
    i.timeline as idea_timeline,
    i.needs_project_manager as idea_needs_project_manager,
    i.created_at as idea_created_at,
    i.updated_at as idea_updated_at,
    u.id as user_id,
    u.username as user_username,
    u.role as user_role,
    u.email as user_email,
    u.password as user_password,
    u.github as user_github,
    u.linkedin as user_linkedin,
    u.twitter as user_twitter,
    u.wallet_address as user_wallet_address,
    u.cv_url as user_cv_url,
    u.created_at as user_created_at,
    u.updated_at as user_updated_at
  FROM ideas AS i
  INNER JOIN users AS u ON i.creator_id = u.id
"#;

const FIND_IDEA_ROW_QUERY: &str = "SELECT * FROM ideas WHERE id = ?1";
const COUNT_IDEAS_QUERY: &str = "SELECT COUNT(*) FROM ideas";

/// Fetches a page of ideas, newest first, with their creators
///
/// # Returns
/// A tuple containing the ideas and the total number of pages
pub async fn list(pool: &SqlitePool, page: i64, limit: i64) -> ApiResult<(Vec<Idea>, i64)> {
  let (page, limit) = page_bounds(page, limit);
  let (total_count, ideas) = tokio::try_join!(get_total_count(pool), fetch_ideas(pool, page, limit))?;

  let total_pages = calculate_total_pages(total_count, limit);

  Ok((ideas, total_pages))
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> ApiResult<Option<Idea>> {
  let query = format!("{IDEA_WITH_CREATOR_COLUMNS} WHERE i.id = ?1");

  sqlx::query(&query)
    .bind(id)
    .try_map(map_row_to_idea)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Raw row without the creator join, used by authorization and capacity checks.
pub async fn find_row(pool: &SqlitePool, id: Uuid) -> ApiResult<Option<IdeaRow>> {
  sqlx::query_as::<_, IdeaRow>(FIND_IDEA_ROW_QUERY)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

async fn fetch_ideas(pool: &SqlitePool, page: i64, limit: i64) -> ApiResult<Vec<Idea>> {
  let offset = page_offset(page, limit);
  let query = format!("{IDEA_WITH_CREATOR_COLUMNS} ORDER BY i.created_at DESC, i.rowid DESC LIMIT ? OFFSET ?");

  sqlx::query(&query)
    .bind(limit)
    .bind(offset)
    .try_map(map_row_to_idea)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

async fn get_total_count(pool: &SqlitePool) -> ApiResult<i64> {
  let (count,): (i64,) = sqlx::query_as(COUNT_IDEAS_QUERY).fetch_one(pool).await?;
  Ok(count)
}

fn map_row_to_idea(row: SqliteRow) -> Result<Idea, sqlx::Error> {
  let raw_resources: String = row.try_get("idea_resources")?;
  let resources = decode_resources(&raw_resources).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

  Ok(Idea {
    id: row.try_get("idea_id")?,
    title: row.try_get("idea_title")?,
    problem_statement: row.try_get("idea_problem_statement")?,
    solution: row.try_get("idea_solution")?,
    project_description: row.try_get("idea_project_description")?,
    image_url: row.try_get("idea_image_url")?,
    resources,
    timeline: row.try_get("idea_timeline")?,
    needs_project_manager: row.try_get("idea_needs_project_manager")?,
    creator: User {
      id: row.try_get("user_id")?,
      username: row.try_get("user_username")?,
      role: row.try_get("user_role")?,
      email: row.try_get("user_email")?,
      password: row.try_get("user_password")?,
      github: row.try_get("user_github")?,
      linkedin: row.try_get("user_linkedin")?,
      twitter: row.try_get("user_twitter")?,
      wallet_address: row.try_get("user_wallet_address")?,
      cv_url: row.try_get("user_cv_url")?,
      created_at: row.try_get("user_created_at")?,
      updated_at: row.try_get("user_updated_at")?,
    },
    created_at: row.try_get("idea_created_at")?,
    updated_at: row.try_get("idea_updated_at")?,
  })
}
