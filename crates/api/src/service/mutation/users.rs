use anyhow::Context;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use chrono::Utc;
use rand_core::OsRng;
use secrecy::{ExposeSecret, SecretBox};
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::task;
use tracing::{error, info};
use uuid::Uuid;

use crate::entities::user::User;
use crate::error::{ApiError, ApiResult};

const FIND_USER_BY_EMAIL_OR_USERNAME: &str = "SELECT * FROM users WHERE email = ?1 OR username = ?2";
const FIND_USER_BY_USERNAME: &str = "SELECT * FROM users WHERE username = ?1";
const FIND_USER_BY_ID: &str = "SELECT * FROM users WHERE id = ?1";
const CREATE_USER: &str = r#"
    INSERT INTO users (id, username, email, password, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?5)
    RETURNING *
"#;
const UPDATE_PROFILE: &str = r#"
    UPDATE users
    SET email = ?1, github = ?2, linkedin = ?3, twitter = ?4, wallet_address = ?5, updated_at = ?6
    WHERE id = ?7
    RETURNING *
"#;
const UPDATE_CV_URL: &str = "UPDATE users SET cv_url = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *";

#[derive(Debug, Deserialize)]
pub struct LoginParams {
  pub username: String,
  pub password: SecretBox<String>,
}

pub async fn login(pool: &SqlitePool, params: LoginParams) -> ApiResult<User> {
  let user = find_user_by_username(pool, &params.username).await?;
  verify_password(SecretBox::from(Box::new(user.password.to_owned())), params.password).await?;
  Ok(user)
}

#[derive(Debug, Deserialize)]
pub struct CreateUserParams {
  pub username: String,
  pub email: String,
  pub password: SecretBox<String>,
}

pub async fn create(pool: &SqlitePool, mut params: CreateUserParams) -> ApiResult<User> {
  if let Some(existing) = find_user_by_email_or_username(pool, &params.email, &params.username).await? {
    let taken = if existing.username == params.username {
      params.username
    } else {
      params.email
    };
    return Err(ApiError::UserAlreadyExist(taken));
  }

  let password = std::mem::take(&mut params.password);
  let hashed_password = hash_password(password).await?;
  create_new_user(pool, params, &hashed_password).await
}

/// Profile fields a user edits on their own account page.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateProfileParams {
  pub email: Option<String>,
  pub github: Option<String>,
  pub linkedin: Option<String>,
  pub twitter: Option<String>,
  pub wallet_address: Option<String>,
}

/// Updates the profile of user `id`. Fields left as `None` keep their current value.
///
/// # Errors
/// - ResourceNotFound if the user doesn't exist
/// - UserAlreadyExist if the new email belongs to another account
pub async fn update_profile(pool: &SqlitePool, id: Uuid, params: UpdateProfileParams) -> ApiResult<User> {
  let current = get_user(pool, id).await?;

  if let Some(email) = params.email.as_deref() {
    if current.email.as_deref() != Some(email) && find_user_by_email_or_username(pool, email, "").await?.is_some() {
      return Err(ApiError::UserAlreadyExist(email.to_string()));
    }
  }

  sqlx::query_as::<_, User>(UPDATE_PROFILE)
    .bind(params.email.or(current.email))
    .bind(params.github.or(current.github))
    .bind(params.linkedin.or(current.linkedin))
    .bind(params.twitter.or(current.twitter))
    .bind(params.wallet_address.or(current.wallet_address))
    .bind(Utc::now())
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn set_cv_url(pool: &SqlitePool, id: Uuid, cv_url: &str) -> ApiResult<User> {
  sqlx::query_as::<_, User>(UPDATE_CV_URL)
    .bind(cv_url)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}

async fn create_new_user(pool: &SqlitePool, params: CreateUserParams, hashed_password: &str) -> ApiResult<User> {
  sqlx::query_as::<_, User>(CREATE_USER)
    .bind(Uuid::new_v4())
    .bind(params.username)
    .bind(params.email)
    .bind(hashed_password)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

async fn hash_password(password: SecretBox<String>) -> ApiResult<String> {
  task::spawn_blocking(move || {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params::new(15000, 2, 1, None).map_err(|err| {
      error!("Invalid argon2 params: {}", err);
      ApiError::Anyhow(anyhow::anyhow!("invalid password hashing params"))
    })?;
    let argon2_config = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    argon2_config
      .hash_password(password.expose_secret().as_bytes(), &salt)
      .map_err(|err| {
        error!("Failed to hash password: {}", err);
        ApiError::InvalidCredentials()
      })
      .map(|hash| hash.to_string())
  })
  .await
  .context("panic in hash_password()")?
}

async fn verify_password(
  expected_password_hash: SecretBox<String>,
  password_candidate: SecretBox<String>,
) -> ApiResult<()> {
  task::spawn_blocking(move || {
    let parsed_hash = PasswordHash::new(expected_password_hash.expose_secret()).map_err(|err| {
      info!("Failed to parse password hash: {}", err);
      ApiError::InvalidCredentials()
    })?;

    Argon2::default()
      .verify_password(password_candidate.expose_secret().as_bytes(), &parsed_hash)
      .map_err(|_| ApiError::InvalidCredentials())
  })
  .await
  .context("panic in verify_password()")?
}

async fn find_user_by_username(pool: &SqlitePool, username: &str) -> ApiResult<User> {
  sqlx::query_as::<_, User>(FIND_USER_BY_USERNAME)
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or(ApiError::InvalidCredentials())
}

async fn find_user_by_email_or_username(pool: &SqlitePool, email: &str, username: &str) -> ApiResult<Option<User>> {
  sqlx::query_as::<_, User>(FIND_USER_BY_EMAIL_OR_USERNAME)
    .bind(email)
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(ApiError::DatabaseError)
}

async fn get_user(pool: &SqlitePool, id: Uuid) -> ApiResult<User> {
  sqlx::query_as::<_, User>(FIND_USER_BY_ID)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}
