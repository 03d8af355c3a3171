use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::User;

/// A role the founder needs filled, as entered on the idea form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct ResourceRequirement {
  pub role: String,
  #[serde(deserialize_with = "deserialize_count")]
  pub count: u32,
  #[serde(default)]
  pub description: String,
}

/// Encodes the resource list the way it is kept in the `ideas.resources` column.
pub fn encode_resources(resources: &[ResourceRequirement]) -> serde_json::Result<String> {
  serde_json::to_string(resources)
}

pub fn decode_resources(raw: &str) -> serde_json::Result<Vec<ResourceRequirement>> {
  if raw.trim().is_empty() {
    return Ok(vec![]);
  }

  serde_json::from_str(raw)
}

// Form inputs post counts as either numbers or numeric strings.
fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
  D: Deserializer<'de>,
{
  struct CountVisitor;

  impl de::Visitor<'_> for CountVisitor {
    type Value = u32;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
      write!(f, "a non-negative integer or a numeric string")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<u32, E> {
      u32::try_from(value).map_err(|_| E::custom(format!("count {value} is too large")))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<u32, E> {
      u32::try_from(value).map_err(|_| E::custom(format!("count {value} is out of range")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<u32, E> {
      value
        .trim()
        .parse::<u32>()
        .map_err(|_| E::custom(format!("'{value}' is not a valid count")))
    }
  }

  deserializer.deserialize_any(CountVisitor)
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone)]
pub struct IdeaRow {
  pub id: Uuid,
  pub title: String,
  pub problem_statement: String,
  pub solution: String,
  pub project_description: String,
  pub image_url: Option<String>,
  pub resources: String,
  pub timeline: Option<String>,
  pub needs_project_manager: bool,
  pub creator_id: Uuid,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl IdeaRow {
  pub fn resources(&self) -> serde_json::Result<Vec<ResourceRequirement>> {
    decode_resources(&self.resources)
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct Idea {
  pub id: Uuid,
  pub title: String,
  pub problem_statement: String,
  pub solution: String,
  pub project_description: String,
  pub image_url: Option<String>,
  pub resources: Vec<ResourceRequirement>,
  pub timeline: Option<String>,
  pub needs_project_manager: bool,
  pub creator: User,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
