use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use imara_swypt::SwyptError;
use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use thiserror::Error;

pub type ApiResult<T = ()> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("Invalid credentials")]
  InvalidCredentials(),
  #[error("User with email `{0}` already exists")]
  UserAlreadyExist(String),
  #[error("Entity `{0}` is not found")]
  ResourceNotFound(String),
  #[error("{0}")]
  Forbidden(String),
  #[error("User is already a contributor of idea `{0}`")]
  AlreadyContributor(String),
  #[error("Role `{0}` has no open slots")]
  RoleUnavailable(String),
  #[error("Payment order `{0}` is not awaiting a transfer")]
  OrderNotTransferable(String),
  #[error("Role `{0}` is not part of this idea")]
  UnknownRole(String),
  #[error("Invalid status value `{0}`")]
  InvalidStatus(String),
  #[error("{0}")]
  InvalidInput(String),
  #[error("Stake could not be verified: {0}")]
  StakeRejected(String),
  #[error("{0} integration is not configured")]
  NotConfigured(&'static str),
  #[error(transparent)]
  Upstream(#[from] SwyptError),
  #[error("Chain RPC error: {0}")]
  Chain(String),
  #[error("GitHub API error: {0}")]
  Github(String),
  #[error("User is not verified for role `{0}`")]
  NotVerified(String),
  #[error("Database error: {0}")]
  DatabaseError(#[from] SqlxError),
  #[error("Storage error: {0}")]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  JsonRejection(JsonRejection),
  #[error(transparent)]
  Multipart(#[from] MultipartError),
  #[error(transparent)]
  InvalidInputError(#[from] validator::ValidationErrors),
  #[error("an internal server error occurred")]
  Anyhow(#[from] anyhow::Error),
}

impl ApiError {
  pub fn response(self) -> (StatusCode, AppResponseError) {
    use ApiError::*;
    let message = self.to_string();

    let (kind, code, details, status_code) = match self {
      JsonRejection(rejection) => (
        "INVALID_INPUT_ERROR",
        None,
        vec![(rejection.status().to_string(), vec![rejection.body_text()])],
        StatusCode::BAD_REQUEST,
      ),
      InvalidInputError(err) => (
        "INVALID_INPUT_ERROR",
        None,
        err
          .field_errors()
          .into_iter()
          .map(|(p, e)| {
            (
              p.to_string(),
              e.iter().map(|err| err.code.to_string()).collect::<Vec<String>>(),
            )
          })
          .collect(),
        StatusCode::BAD_REQUEST,
      ),
      Multipart(ref err) => (
        "INVALID_INPUT_ERROR",
        None,
        vec![("file".to_string(), vec![err.body_text()])],
        err.status(),
      ),
      InvalidStatus(_) | InvalidInput(_) | StakeRejected(_) => {
        ("INVALID_INPUT_ERROR", None, vec![], StatusCode::BAD_REQUEST)
      },
      InvalidCredentials() => ("INVALID_CREDENTIALS", None, vec![], StatusCode::UNAUTHORIZED),
      Forbidden(_) | NotVerified(_) => ("FORBIDDEN", None, vec![], StatusCode::FORBIDDEN),
      ResourceNotFound(_) => ("RESOURCE_NOT_FOUND", None, vec![], StatusCode::NOT_FOUND),
      UserAlreadyExist(_) | AlreadyContributor(_) | RoleUnavailable(_) | UnknownRole(_) | OrderNotTransferable(_) => {
        ("CONFLICT", None, vec![], StatusCode::CONFLICT)
      },
      NotConfigured(_) => ("UPSTREAM_ERROR", None, vec![], StatusCode::SERVICE_UNAVAILABLE),
      Upstream(ref e) => {
        tracing::error!("Payment aggregator error: {:?}", e);

        ("UPSTREAM_ERROR", None, vec![], StatusCode::BAD_GATEWAY)
      },
      Chain(ref e) => {
        tracing::error!("Chain RPC error: {}", e);

        ("UPSTREAM_ERROR", None, vec![], StatusCode::BAD_GATEWAY)
      },
      Github(ref e) => {
        tracing::error!("GitHub API error: {}", e);

        ("UPSTREAM_ERROR", None, vec![], StatusCode::BAD_GATEWAY)
      },
      DatabaseError(ref e) => {
        tracing::error!("Database error: {:?}", e);

        ("INTERNAL_SERVER_ERROR", None, vec![], StatusCode::INTERNAL_SERVER_ERROR)
      },
      Io(ref e) => {
        tracing::error!("Storage error: {:?}", e);

        ("INTERNAL_SERVER_ERROR", None, vec![], StatusCode::INTERNAL_SERVER_ERROR)
      },
      Anyhow(ref e) => {
        tracing::error!("Generic error: {:?}", e);

        ("INTERNAL_SERVER_ERROR", None, vec![], StatusCode::INTERNAL_SERVER_ERROR)
      },
    };

    (status_code, AppResponseError::new(kind, message, code, details))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status_code, body) = self.response();
    (status_code, Json(body)).into_response()
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::JsonRejection(rejection)
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AppResponseError {
  pub kind: String,
  pub error_message: String,
  pub code: Option<i32>,
  pub details: Vec<(String, Vec<String>)>,
}

impl AppResponseError {
  pub fn new(
    kind: impl Into<String>,
    message: impl Into<String>,
    code: Option<i32>,
    details: Vec<(String, Vec<String>)>,
  ) -> Self {
    Self {
      kind: kind.into(),
      error_message: message.into(),
      code,
      details,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_capacity_errors_are_conflicts() {
    let (status, body) = ApiError::RoleUnavailable("Builder".to_string()).response();

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.kind, "CONFLICT");
    assert_eq!(body.error_message, "Role `Builder` has no open slots");
  }

  #[test]
  fn test_internal_errors_hide_details() {
    let (status, body) = ApiError::Anyhow(anyhow::anyhow!("secret connection string")).response();

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.error_message, "an internal server error occurred");
  }

  #[test]
  fn test_missing_integration_is_unavailable() {
    let (status, body) = ApiError::NotConfigured("Swypt").response();

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.kind, "UPSTREAM_ERROR");
  }
}
