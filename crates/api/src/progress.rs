//! Project progress derived from milestones and their tasks.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{milestone::Milestone, task::WorkStatus};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct NextMilestone {
  pub id: Uuid,
  pub title: String,
  pub due_date: NaiveDate,
  pub days_until_due: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct ProjectProgress {
  pub percentage: u8,
  pub next_milestone: Option<NextMilestone>,
}

pub fn project_progress(milestones: &[Milestone], now: DateTime<Utc>) -> ProjectProgress {
  ProjectProgress {
    percentage: completion_percentage(milestones),
    next_milestone: next_milestone(milestones, now),
  }
}

/// Share of completed work in `[0, 100]`.
///
/// Every milestone carries the same weight. A milestone without tasks counts only once it is
/// completed itself, otherwise its weight is split evenly over its tasks.
pub fn completion_percentage(milestones: &[Milestone]) -> u8 {
  if milestones.is_empty() {
    return 0;
  }

  let weight = 100.0 / milestones.len() as f64;

  let total: f64 = milestones
    .iter()
    .map(|milestone| {
      if milestone.tasks.is_empty() {
        return if milestone.status == WorkStatus::Completed { weight } else { 0.0 };
      }

      let per_task = weight / milestone.tasks.len() as f64;
      let completed = milestone
        .tasks
        .iter()
        .filter(|task| task.status == WorkStatus::Completed)
        .count();

      per_task * completed as f64
    })
    .sum();

  total.round().clamp(0.0, 100.0) as u8
}

/// Earliest-due milestone that is not completed yet.
pub fn next_milestone(milestones: &[Milestone], now: DateTime<Utc>) -> Option<NextMilestone> {
  milestones
    .iter()
    .filter(|milestone| milestone.status != WorkStatus::Completed)
    .min_by_key(|milestone| milestone.due_date)
    .map(|milestone| NextMilestone {
      id: milestone.id,
      title: milestone.title.clone(),
      due_date: milestone.due_date,
      days_until_due: days_until(milestone.due_date, now),
    })
}

// Whole days left until midnight UTC of `due_date`, rounded up and never negative.
fn days_until(due_date: NaiveDate, now: DateTime<Utc>) -> i64 {
  let due = due_date.and_time(NaiveTime::MIN).and_utc();
  let seconds = (due - now).num_seconds();

  if seconds <= 0 {
    return 0;
  }

  (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::entities::task::Task;

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 14, 30, 0).unwrap()
  }

  fn task(status: WorkStatus) -> Task {
    Task {
      id: Uuid::new_v4(),
      milestone_id: Uuid::nil(),
      title: "task".to_string(),
      description: String::new(),
      assignee_id: None,
      due_date: None,
      status,
      evidence_url: None,
      reviewed: false,
      created_by: Uuid::nil(),
      created_at: now(),
      updated_at: now(),
    }
  }

  fn milestone(status: WorkStatus, due_in_days: i64, tasks: Vec<Task>) -> Milestone {
    Milestone {
      id: Uuid::new_v4(),
      project_id: Uuid::nil(),
      title: format!("due in {due_in_days}"),
      description: String::new(),
      due_date: (now() + Duration::days(due_in_days)).date_naive(),
      status,
      created_by: Uuid::nil(),
      tasks,
      created_at: now(),
      updated_at: now(),
    }
  }

  #[test]
  fn test_no_milestones_is_zero() {
    assert_eq!(completion_percentage(&[]), 0);
  }

  #[test]
  fn test_everything_completed_is_hundred() {
    let milestones = vec![
      milestone(WorkStatus::Completed, 1, vec![]),
      milestone(WorkStatus::InProgress, 2, vec![task(WorkStatus::Completed), task(WorkStatus::Completed)]),
      milestone(WorkStatus::Pending, 3, vec![task(WorkStatus::Completed)]),
    ];

    assert_eq!(completion_percentage(&milestones), 100);
  }

  #[test]
  fn test_one_of_four_single_task_milestones() {
    let milestones = vec![
      milestone(WorkStatus::Pending, 1, vec![task(WorkStatus::Completed)]),
      milestone(WorkStatus::Pending, 2, vec![task(WorkStatus::Pending)]),
      milestone(WorkStatus::Pending, 3, vec![task(WorkStatus::InProgress)]),
      milestone(WorkStatus::Pending, 4, vec![task(WorkStatus::Pending)]),
    ];

    assert_eq!(completion_percentage(&milestones), 25);
  }

  #[test]
  fn test_one_of_n_rounds_to_nearest() {
    for n in 1..=12 {
      let mut milestones = vec![milestone(WorkStatus::Pending, 1, vec![task(WorkStatus::Completed)])];
      milestones.extend((1..n).map(|i| milestone(WorkStatus::Pending, i, vec![task(WorkStatus::Pending)])));

      assert_eq!(completion_percentage(&milestones) as f64, (100.0 / n as f64).round());
    }
  }

  #[test]
  fn test_taskless_milestone_counts_only_when_completed() {
    let milestones = vec![
      milestone(WorkStatus::InProgress, 1, vec![]),
      milestone(WorkStatus::Completed, 2, vec![]),
    ];

    assert_eq!(completion_percentage(&milestones), 50);
  }

  #[test]
  fn test_milestone_status_ignored_when_it_has_tasks() {
    let milestones = vec![milestone(
      WorkStatus::Completed,
      1,
      vec![task(WorkStatus::Completed), task(WorkStatus::Pending), task(WorkStatus::Pending)],
    )];

    assert_eq!(completion_percentage(&milestones), 33);
  }

  #[test]
  fn test_percentage_stays_in_range() {
    let statuses = [WorkStatus::Pending, WorkStatus::InProgress, WorkStatus::Completed];
    let milestones: Vec<Milestone> = (0..7)
      .map(|i| {
        let tasks = (0..i).map(|j| task(statuses[(i + j) as usize % 3])).collect();
        milestone(statuses[i as usize % 3], i, tasks)
      })
      .collect();

    for len in 0..=milestones.len() {
      assert!(completion_percentage(&milestones[..len]) <= 100);
    }
  }

  #[test]
  fn test_next_milestone_is_earliest_due() {
    let milestones = vec![
      milestone(WorkStatus::Pending, 5, vec![]),
      milestone(WorkStatus::InProgress, 1, vec![]),
      milestone(WorkStatus::Pending, 10, vec![]),
    ];

    let next = next_milestone(&milestones, now()).unwrap();

    assert_eq!(next.id, milestones[1].id);
    assert_eq!(next.days_until_due, 1);
  }

  #[test]
  fn test_next_milestone_skips_completed() {
    let milestones = vec![
      milestone(WorkStatus::Completed, 1, vec![]),
      milestone(WorkStatus::Pending, 7, vec![]),
    ];

    let next = next_milestone(&milestones, now()).unwrap();

    assert_eq!(next.id, milestones[1].id);
    assert_eq!(next.days_until_due, 7);
  }

  #[test]
  fn test_overdue_milestone_reports_zero_days() {
    let milestones = vec![milestone(WorkStatus::Pending, -3, vec![])];

    assert_eq!(next_milestone(&milestones, now()).unwrap().days_until_due, 0);
  }

  #[test]
  fn test_no_open_milestones() {
    assert!(next_milestone(&[], now()).is_none());
    assert!(next_milestone(&[milestone(WorkStatus::Completed, 2, vec![])], now()).is_none());
  }
}
