use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use imara_swypt::SwyptConfig;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_UPLOAD_DIR: &str = "./uploads";
const DEFAULT_TYPING_TTL_SECS: u64 = 3;
const DEFAULT_SETTLEMENT_WORKERS: u32 = 2;
const DEFAULT_SETTLEMENT_INTERVAL_SECS: u64 = 2;
const DEFAULT_SETTLEMENT_MAX_ATTEMPTS: u32 = 30;
const DEFAULT_PERMIT_TTL_SECS: i64 = 3600;
const DEFAULT_STAKE_TOKEN_NAME: &str = "USDC";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone)]
pub struct ChainSettings {
  pub rpc_url: String,
  pub chain_id: u64,
  pub stake_contract: String,
  pub token_address: String,
  pub token_name: String,
  /// Project/milestone escrow contract. Unsigned project transactions need it.
  pub project_contract: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GithubSettings {
  pub api_url: String,
  pub token: Option<String>,
}

impl Default for GithubSettings {
  fn default() -> Self {
    Self {
      api_url: DEFAULT_GITHUB_API_URL.to_string(),
      token: None,
    }
  }
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
  pub service_id: String,
  pub template_id: String,
  pub public_key: String,
  pub app_base_url: String,
}

#[derive(Debug, Clone)]
pub struct SettlementSettings {
  pub num_workers: u32,
  pub interval: Duration,
  pub max_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct Settings {
  pub log_level: String,
  pub database_url: String,
  pub host: String,
  pub port: u16,
  pub cors_origin: String,
  pub jwt_secret: String,
  /// Token lifetime in minutes.
  pub jwt_maxage: i64,
  pub upload_dir: PathBuf,
  pub typing_ttl: Duration,
  pub permit_ttl_secs: i64,
  pub settlement: SettlementSettings,
  pub swypt: Option<SwyptConfig>,
  pub chain: Option<ChainSettings>,
  pub email: Option<EmailSettings>,
  pub github: GithubSettings,
}

impl Settings {
  /// Reads settings from the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
  pub fn from_env() -> Result<Self> {
    Ok(Self {
      log_level: optional("IMARA_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
      database_url: required("DATABASE_URL")?,
      host: required("HOST")?,
      port: parse_required("PORT")?,
      cors_origin: optional("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
      jwt_secret: required("JWT_SECRET")?,
      jwt_maxage: parse_required("JWT_MAXAGE")?,
      upload_dir: optional("UPLOAD_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
      typing_ttl: Duration::from_secs(parse_optional("TYPING_TTL_SECS")?.unwrap_or(DEFAULT_TYPING_TTL_SECS)),
      permit_ttl_secs: parse_optional("PERMIT_TTL_SECS")?.unwrap_or(DEFAULT_PERMIT_TTL_SECS),
      settlement: SettlementSettings {
        num_workers: parse_optional("SETTLEMENT_WORKERS")?.unwrap_or(DEFAULT_SETTLEMENT_WORKERS),
        interval: Duration::from_secs(
          parse_optional("SETTLEMENT_INTERVAL_SECS")?.unwrap_or(DEFAULT_SETTLEMENT_INTERVAL_SECS),
        ),
        max_attempts: parse_optional("SETTLEMENT_MAX_ATTEMPTS")?.unwrap_or(DEFAULT_SETTLEMENT_MAX_ATTEMPTS),
      },
      swypt: swypt_from_env()?,
      chain: chain_from_env()?,
      email: email_from_env()?,
      github: GithubSettings {
        api_url: optional("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
        token: optional("GITHUB_TOKEN"),
      },
    })
  }

  pub fn server_url(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}

fn swypt_from_env() -> Result<Option<SwyptConfig>> {
  let Some(base_url) = optional("SWYPT_API_URL") else {
    return Ok(None);
  };

  Ok(Some(SwyptConfig {
    base_url,
    api_key: required("SWYPT_API_KEY")?,
    api_secret: required("SWYPT_API_SECRET")?,
    deposit_address: required("DEPOSIT_ADDRESS")?,
    token_address: required("SWYPT_USDT_TOKEN_ADDRESS")?,
  }))
}

fn chain_from_env() -> Result<Option<ChainSettings>> {
  let Some(rpc_url) = optional("CHAIN_RPC_URL") else {
    return Ok(None);
  };

  Ok(Some(ChainSettings {
    rpc_url,
    chain_id: parse_required("CHAIN_ID")?,
    stake_contract: required("STAKE_CONTRACT_ADDRESS")?,
    token_address: required("STAKE_TOKEN_ADDRESS")?,
    token_name: optional("STAKE_TOKEN_NAME").unwrap_or_else(|| DEFAULT_STAKE_TOKEN_NAME.to_string()),
    project_contract: optional("PROJECT_CONTRACT_ADDRESS"),
  }))
}

fn email_from_env() -> Result<Option<EmailSettings>> {
  let Some(service_id) = optional("EMAILJS_SERVICE_ID") else {
    return Ok(None);
  };

  Ok(Some(EmailSettings {
    service_id,
    template_id: required("EMAILJS_TEMPLATE_ID")?,
    public_key: required("EMAILJS_PUBLIC_KEY")?,
    app_base_url: required("APP_BASE_URL")?,
  }))
}

fn optional(key: &str) -> Option<String> {
  env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required(key: &str) -> Result<String> {
  optional(key).with_context(|| format!("{key} is not set in .env file"))
}

fn parse_required<T>(key: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  required(key)?
    .parse::<T>()
    .with_context(|| format!("{key} has an invalid value"))
}

fn parse_optional<T>(key: &str) -> Result<Option<T>>
where
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  optional(key)
    .map(|value| value.parse::<T>().with_context(|| format!("{key} has an invalid value")))
    .transpose()
}
