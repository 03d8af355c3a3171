use axum::{body::Bytes, extract::Multipart};
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};

pub mod auth;
pub mod chat;
pub mod contributors;
pub mod ideas;
pub mod milestones;
pub mod payments;
pub mod projects;
pub mod stakes;
pub mod tasks;
pub mod timelines;
pub mod users;
pub mod verifications;

const UPLOAD_FIELD: &str = "file";

/// Multipart body carrying a single `file` field.
#[derive(ToSchema)]
#[allow(dead_code)]
pub(crate) struct UploadForm {
  #[schema(value_type = String, format = Binary)]
  file: Vec<u8>,
}

/// Reads the `file` field of a multipart upload, returning its file name and content.
pub(crate) async fn read_upload(mut multipart: Multipart) -> ApiResult<(String, Bytes)> {
  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some(UPLOAD_FIELD) {
      continue;
    }

    let file_name = field.file_name().unwrap_or(UPLOAD_FIELD).to_string();
    let bytes = field.bytes().await?;

    return Ok((file_name, bytes));
  }

  Err(ApiError::InvalidInput("Multipart field `file` is required".to_string()))
}
