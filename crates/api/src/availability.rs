//! Role capacity of an idea's team.
//!
//! Only approved contributors occupy a slot. Pending requests never block other applicants,
//! capacity is enforced again when a founder approves someone.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{
  contributor::{Contributor, ContributorStatus},
  idea::ResourceRequirement,
};

/// Contributor status that counts against a role's capacity.
pub const FILLED_STATUS: ContributorStatus = ContributorStatus::Approved;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct RoleAvailability {
  pub role: String,
  pub required: u32,
  pub filled: u32,
  pub available: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct TeamAvailability {
  pub roles: Vec<RoleAvailability>,
  pub team_full: bool,
}

impl TeamAvailability {
  pub fn role(&self, role: &str) -> Option<&RoleAvailability> {
    self.roles.iter().find(|availability| availability.role == role.trim())
  }

  pub fn is_role_available(&self, role: &str) -> bool {
    self.role(role).is_some_and(|availability| availability.available)
  }
}

/// Merges duplicate role entries, keeping the order in which roles first appear.
pub fn required_counts(resources: &[ResourceRequirement]) -> Vec<(String, u32)> {
  let mut counts: Vec<(String, u32)> = Vec::with_capacity(resources.len());

  for resource in resources {
    let role = resource.role.trim();
    match counts.iter_mut().find(|(existing, _)| existing == role) {
      Some((_, count)) => *count = count.saturating_add(resource.count),
      None => counts.push((role.to_string(), resource.count)),
    }
  }

  counts
}

pub fn evaluate(resources: &[ResourceRequirement], contributors: &[Contributor]) -> TeamAvailability {
  let mut filled_by_role: HashMap<&str, u32> = HashMap::new();
  for contributor in contributors.iter().filter(|c| c.status == FILLED_STATUS) {
    *filled_by_role.entry(contributor.role.trim()).or_default() += 1;
  }

  let roles: Vec<RoleAvailability> = required_counts(resources)
    .into_iter()
    .map(|(role, required)| {
      let filled = filled_by_role.get(role.as_str()).copied().unwrap_or(0).min(required);

      RoleAvailability {
        available: filled < required,
        role,
        required,
        filled,
      }
    })
    .collect();

  let required: u64 = roles.iter().map(|r| u64::from(r.required)).sum();
  let filled: u64 = roles.iter().map(|r| u64::from(r.filled)).sum();

  TeamAvailability {
    team_full: filled >= required,
    roles,
  }
}

pub fn is_role_available(resources: &[ResourceRequirement], contributors: &[Contributor], role: &str) -> bool {
  evaluate(resources, contributors).is_role_available(role)
}
