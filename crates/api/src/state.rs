use std::sync::Arc;

use imara_swypt::SwyptClient;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::{
  chain::ChainClient,
  chat::ChatHub,
  config::{ChainSettings, Settings},
  error::{ApiError, ApiResult},
  github::GithubClient,
  handlers::auth::Keys,
  mailer::{EmailJsMailer, LogMailer, Mailer},
  storage::UploadStore,
};

/// Process-wide handles shared by every request. Built once at startup.
#[derive(Clone)]
pub struct AppState {
  pub pool: Arc<SqlitePool>,
  pub settings: Arc<Settings>,
  pub keys: Arc<Keys>,
  pub chat: ChatHub,
  pub uploads: UploadStore,
  pub swypt: Option<Arc<SwyptClient>>,
  pub chain: Option<ChainClient>,
  pub github: GithubClient,
  pub mailer: Arc<dyn Mailer>,
  pub cancel_token: CancellationToken,
}

impl AppState {
  pub fn new(pool: Arc<SqlitePool>, settings: Settings, cancel_token: CancellationToken) -> anyhow::Result<Self> {
    let swypt = settings
      .swypt
      .clone()
      .map(SwyptClient::new)
      .transpose()?
      .map(Arc::new);

    let chain = settings
      .chain
      .as_ref()
      .map(|chain| ChainClient::new(chain.rpc_url.clone()))
      .transpose()?;

    let github = GithubClient::new(&settings.github)?;

    let mailer: Arc<dyn Mailer> = match settings.email.clone() {
      Some(email) => Arc::new(EmailJsMailer::new(email)?),
      None => Arc::new(LogMailer),
    };

    Ok(Self {
      pool,
      keys: Arc::new(Keys::new(settings.jwt_secret.as_bytes())),
      chat: ChatHub::default(),
      uploads: UploadStore::new(settings.upload_dir.clone()),
      swypt,
      chain,
      github,
      mailer,
      cancel_token,
      settings: Arc::new(settings),
    })
  }

  pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
    self.mailer = mailer;
    self
  }

  pub fn swypt(&self) -> ApiResult<&SwyptClient> {
    self.swypt.as_deref().ok_or(ApiError::NotConfigured("Swypt"))
  }

  /// Chain client and its settings, when an RPC endpoint is configured.
  pub fn chain(&self) -> Option<(&ChainClient, &ChainSettings)> {
    self.chain.as_ref().zip(self.settings.chain.as_ref())
  }
}
