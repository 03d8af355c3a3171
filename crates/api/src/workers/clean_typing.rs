use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use tokio::select;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::service::mutation;

/// Deletes stale typing indicators every `interval` until cancelled.
pub async fn run(pool: Arc<SqlitePool>, interval: Duration, cancel_token: CancellationToken) -> Result<()> {
  info!("Cleaning typing indicators job started");

  while !cancel_token.is_cancelled() {
    select! {
      biased;
      _ = cancel_token.cancelled() => {
        info!("Cleaning typing indicators job stopped");
        break;
      }
      _ = sleep(interval) => {
        match mutation::chat::delete_expired_typing(&pool, Utc::now().timestamp()).await {
          Ok(deleted) => debug!("Delete {} expired typing indicators", deleted),
          Err(e) => error!("Failed to delete typing indicators: {}", e),
        }
      }
    }
  }

  Ok(())
}
