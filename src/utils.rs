use anyhow::{Error, Result};
use tokio::sync::mpsc::channel;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type Task = futures::future::BoxFuture<'static, Result<()>>;

/// Runs every task until one fails or the token is cancelled.
pub async fn join_all(tasks: Vec<Task>, cancel_token: CancellationToken) -> Result<()> {
  let (sender, mut receiver) = channel::<Error>(1);
  for task in tasks {
    let sender = sender.clone();
    tokio::spawn(async move {
      if let Err(e) = task.await {
        if sender.send(e).await.is_err() {
          warn!("Task failed after shutdown started");
        }
      }
    });
  }
  // Keeps the channel open while tasks finish cleanly.
  let _sender = sender;

  tokio::select! {
    Some(err) = receiver.recv() => Err(err),
    _ = cancel_token.cancelled() => {
      debug!("Receive cancel signal...");

      Ok(())
    },
  }
}
