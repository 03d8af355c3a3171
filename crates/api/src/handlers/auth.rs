use axum::{
  extract::{Request, State},
  http::{header, StatusCode},
  middleware::Next,
  response::IntoResponse,
  Json,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::service::query;
use crate::state::AppState;

pub const AUTH_COOKIE_NAME: &str = "token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
  pub sub: String, // User associated with token
  pub iat: usize,  // Issued at time of the token
  pub exp: usize,  // Expiry time of the token
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub status: &'static str,
  pub message: String,
}

pub struct Keys {
  pub encoding: EncodingKey,
  pub decoding: DecodingKey,
}

impl Keys {
  pub fn new(secret: &[u8]) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
    }
  }
}

pub fn encode_jwt(keys: &Keys, user_id: Uuid, maxage_minutes: i64) -> ApiResult<String> {
  let now = chrono::Utc::now();
  let iat = now.timestamp() as usize;
  let exp = (now + chrono::Duration::minutes(maxage_minutes)).timestamp() as usize;
  let claims: Claims = Claims {
    sub: user_id.to_string(),
    exp,
    iat,
  };

  encode(&Header::default(), &claims, &keys.encoding)
    .map_err(|_| ApiError::Anyhow(anyhow::anyhow!("Can't encode token")))
}

/// Resolves the user id carried by a token, if the token is valid.
pub fn decode_jwt(keys: &Keys, token: &str) -> Option<Uuid> {
  let claims = decode::<Claims>(token, &keys.decoding, &Validation::default()).ok()?.claims;
  Uuid::parse_str(&claims.sub).ok()
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
  let json_error = ErrorResponse {
    status: "fail",
    message: message.to_string(),
  };
  (StatusCode::UNAUTHORIZED, Json(json_error))
}

pub async fn auth_guard(
  cookie_jar: CookieJar,
  State(state): State<AppState>,
  mut req: Request,
  next: Next,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
  let token = cookie_jar
    .get(AUTH_COOKIE_NAME)
    .map(|cookie| cookie.value().to_string())
    .or_else(|| {
      req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| {
          auth_value
            .strip_prefix("Bearer ")
            .map(|auth_value| auth_value.to_owned())
        })
    });

  let token = token.ok_or_else(|| unauthorized("You are not logged in, please provide token"))?;

  let user_id = decode_jwt(&state.keys, &token).ok_or_else(|| unauthorized("Invalid token"))?;

  let user = query::users::find_by_id(&state.pool, user_id)
    .await
    .map_err(|_| unauthorized("You are not logged in, please provide token"))?
    .ok_or_else(|| unauthorized("The user belonging to this token no longer exists"))?;

  debug!("fetch user model from db {:?}", user.id);

  req.extensions_mut().insert(user);
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_token_round_trip() {
    let keys = Keys::new(b"secret");
    let user_id = Uuid::new_v4();

    let token = encode_jwt(&keys, user_id, 60).unwrap();

    assert_eq!(decode_jwt(&keys, &token), Some(user_id));
  }

  #[test]
  fn test_foreign_or_expired_tokens_are_rejected() {
    let keys = Keys::new(b"secret");
    let user_id = Uuid::new_v4();

    let foreign = encode_jwt(&Keys::new(b"other"), user_id, 60).unwrap();
    let expired = encode_jwt(&keys, user_id, -10).unwrap();

    assert_eq!(decode_jwt(&keys, &foreign), None);
    assert_eq!(decode_jwt(&keys, &expired), None);
    assert_eq!(decode_jwt(&keys, "garbage"), None);
  }
}
