use std::collections::HashMap;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
  entities::{
    milestone::{Milestone, MilestoneRow},
    task::Task,
  },
  error::ApiResult,
};

const LIST_PROJECT_MILESTONES: &str =
  "SELECT * FROM milestones WHERE project_id = ?1 ORDER BY due_date, created_at, rowid";
const LIST_PROJECT_TASKS: &str = r#"
  SELECT t.*
  FROM milestone_tasks AS t
  INNER JOIN milestones AS m ON t.milestone_id = m.id
  WHERE m.project_id = ?1
  ORDER BY t.created_at, t.rowid
"#;
const FIND_MILESTONE: &str = "SELECT * FROM milestones WHERE id = ?1";

/// Milestones of a project ordered by due date, each with its tasks
pub async fn list_for_project(pool: &SqlitePool, project_id: Uuid) -> ApiResult<Vec<Milestone>> {
  let (rows, tasks) = tokio::try_join!(fetch_milestones(pool, project_id), fetch_tasks(pool, project_id))?;

  let mut tasks_by_milestone: HashMap<Uuid, Vec<Task>> = HashMap::new();
  for task in tasks {
    tasks_by_milestone.entry(task.milestone_id).or_default().push(task);
  }

  Ok(
    rows
      .into_iter()
      .map(|row| {
        let tasks = tasks_by_milestone.remove(&row.id).unwrap_or_default();
        Milestone::from_row(row, tasks)
      })
      .collect(),
  )
}

pub async fn find_row(pool: &SqlitePool, id: Uuid) -> ApiResult<Option<MilestoneRow>> {
  sqlx::query_as::<_, MilestoneRow>(FIND_MILESTONE)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

async fn fetch_milestones(pool: &SqlitePool, project_id: Uuid) -> ApiResult<Vec<MilestoneRow>> {
  sqlx::query_as::<_, MilestoneRow>(LIST_PROJECT_MILESTONES)
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

async fn fetch_tasks(pool: &SqlitePool, project_id: Uuid) -> ApiResult<Vec<Task>> {
  sqlx::query_as::<_, Task>(LIST_PROJECT_TASKS)
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}
