use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, Result};
use futures::FutureExt;
use imara_api::{config::Settings, state::AppState, workers::clean_typing, MIGRATOR};
use imara_settlement::SettlementSystem;
use imara_swypt::OrderGateway;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod utils;

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();

  let settings = Settings::from_env()?;

  let env_filter = EnvFilter::from_default_env().add_directive(settings.log_level.parse()?);

  // Initialize tracing subscriber with the environment filter
  tracing_subscriber::fmt().with_env_filter(env_filter).init();

  rustls::crypto::ring::default_provider()
    .install_default()
    .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

  let cancel_token = CancellationToken::new();

  // Start task for catching interrupt
  tokio::spawn({
    let cancel_token = cancel_token.clone();
    async move {
      let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
          error!("Failed to listen for Ctrl-C: {}", e);
          std::future::pending::<()>().await;
        }
      };

      #[cfg(unix)]
      let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
          Ok(mut stream) => {
            stream.recv().await;
          },
          Err(e) => {
            error!("Failed to install terminate handler: {}", e);
            std::future::pending::<()>().await;
          },
        }
      };

      #[cfg(not(unix))]
      let terminate = std::future::pending::<()>();

      tokio::select! {
        _ = ctrl_c => {
          info!("Received Ctrl-C, shutting down...");
          cancel_token.cancel()
        },
        _ = terminate => {
          info!("Received terminate, shutting down...");
          cancel_token.cancel()
        },
      }
    }
  });

  let connect_options = SqliteConnectOptions::from_str(&settings.database_url)?.create_if_missing(true);
  let pool = SqlitePoolOptions::new()
    .max_connections(100)
    .min_connections(5)
    .connect_with(connect_options)
    .await?;

  MIGRATOR.run(&pool).await?;

  let shared_pool = Arc::new(pool);
  let typing_ttl = settings.typing_ttl;
  let settlement = settings.settlement.clone();

  let state = AppState::new(shared_pool.clone(), settings, cancel_token.clone())?;

  let mut tasks = vec![
    imara_api::run(state.clone(), cancel_token.clone()).boxed(),
    clean_typing::run(shared_pool.clone(), typing_ttl, cancel_token.clone()).boxed(),
  ];

  match state.swypt.clone() {
    Some(swypt) => {
      let gateway: Arc<dyn OrderGateway> = swypt;
      let settlement_system = SettlementSystem::new(shared_pool.clone(), gateway, settlement);
      tasks.push(settlement_system.run(cancel_token.clone()).boxed());
    },
    None => warn!("Swypt is not configured, M-Pesa orders won't be settled"),
  }

  if let Err(err) = utils::join_all(tasks, cancel_token).await {
    error!("One of main thread get error while execution: {:?}", err);
  }

  shared_pool.close().await;

  Ok(())
}
