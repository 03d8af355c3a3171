use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use sqlx::SqlitePool;
use tokio::{
  sync::{
    mpsc::{channel, Receiver, Sender},
    Mutex,
  },
  time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use imara_api::{
  config::SettlementSettings,
  entities::payment::{PaymentOrder, PaymentStatus},
  service::{mutation, query},
};
use imara_swypt::{OrderGateway, PaymentPoller, PollOutcome, PollStep};

use crate::error::SettlementResult;

const CHANNEL_CAPACITY: usize = 500;
const BATCH_SIZE: i64 = 100;

/// Drives pending M-Pesa orders to a terminal state.
///
/// A poller fetches pending orders from the database and hands them to a fixed set of workers.
/// Each worker checks an order once per round; orders that stay pending are picked up again on
/// the next round until they run out of attempts.
pub struct SettlementSystem {
  settings: SettlementSettings,
  pool: Arc<SqlitePool>,
  gateway: Arc<dyn OrderGateway>,
  in_flight: Arc<Mutex<HashSet<String>>>,
  tx: Sender<PaymentOrder>,
  rx: Arc<Mutex<Receiver<PaymentOrder>>>,
}

impl SettlementSystem {
  pub fn new(pool: Arc<SqlitePool>, gateway: Arc<dyn OrderGateway>, settings: SettlementSettings) -> Self {
    let (tx, rx) = channel::<PaymentOrder>(CHANNEL_CAPACITY);

    Self {
      settings,
      pool,
      gateway,
      in_flight: Arc::new(Mutex::new(HashSet::new())),
      tx,
      rx: Arc::new(Mutex::new(rx)),
    }
  }

  #[instrument(level = "debug", skip(self, cancel_token))]
  pub async fn run(self, cancel_token: CancellationToken) -> Result<()> {
    let mut handlers = vec![];
    info!("Starting settlement system...");

    handlers.push(self.spawn_order_poller(cancel_token.clone()));
    handlers.extend(self.spawn_workers(cancel_token));

    info!("Settlement system started");

    futures::future::join_all(handlers).await;
    info!("Settlement system stopped");

    Ok(())
  }

  fn spawn_order_poller(&self, cancel_token: CancellationToken) -> tokio::task::JoinHandle<()> {
    let pool = self.pool.clone();
    let tx = self.tx.clone();
    let in_flight = self.in_flight.clone();
    let interval = self.settings.interval;

    tokio::spawn(async move {
      info!("Payment order poller started");

      while !cancel_token.is_cancelled() {
        tokio::select! {
          _ = sleep(interval) => {
            debug!("Start polling pending payment orders from db...");

            match query::payments::list_pending(&pool, BATCH_SIZE).await {
              Ok(orders) => {
                // Orders still being checked from the previous round are skipped.
                let fresh = {
                  let mut in_flight = in_flight.lock().await;
                  orders
                    .into_iter()
                    .filter(|order| in_flight.insert(order.order_id.clone()))
                    .collect::<Vec<_>>()
                };

                debug!("Found {} payment orders to check", fresh.len());
                for order in fresh {
                  if let Err(e) = tx.send(order).await {
                    error!("Failed to send payment order to settlement workers: {}", e);
                  }
                }
              },
              Err(e) => error!("Failed to get pending payment orders: {}", e),
            }
          }
          _ = cancel_token.cancelled() => {
            info!("Payment order poller stopped");
            break;
          }
        }
      }
    })
  }

  fn spawn_workers(&self, cancel_token: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
    info!("Starting {} settlement workers...", self.settings.num_workers);

    (0..self.settings.num_workers)
      .map(|id| self.spawn_worker(id, cancel_token.clone()))
      .collect()
  }

  fn spawn_worker(&self, id: u32, cancel_token: CancellationToken) -> tokio::task::JoinHandle<()> {
    let rx = Arc::clone(&self.rx);
    let pool = self.pool.clone();
    let gateway = self.gateway.clone();
    let in_flight = self.in_flight.clone();
    let max_attempts = self.settings.max_attempts;

    tokio::spawn(async move {
      loop {
        let order = {
          let mut rx = rx.lock().await;

          tokio::select! {
            order = rx.recv() => order,
            _ = cancel_token.cancelled() => None,
          }
        };

        let Some(order) = order else {
          info!("Settlement worker {} stopped", id);
          break;
        };

        debug!("Worker {} received payment order {}", id, order.order_id);

        if let Err(e) = settle(&pool, gateway.as_ref(), &order, max_attempts).await {
          error!("Worker {} failed to settle payment order {}: {}", id, order.order_id, e);
        }

        in_flight.lock().await.remove(&order.order_id);
      }
    })
  }
}

/// Checks a pending order once and records the result.
///
/// Returns the updated order, or `None` when another writer already moved it out of `pending`.
#[instrument(level = "debug", skip(pool, gateway, order), fields(order_id = %order.order_id))]
pub async fn settle<G>(
  pool: &SqlitePool,
  gateway: &G,
  order: &PaymentOrder,
  max_attempts: u32,
) -> SettlementResult<Option<PaymentOrder>>
where
  G: OrderGateway + ?Sized,
{
  let order_id = order.order_id.as_str();

  let step = match PaymentPoller::check_once(gateway, order_id).await {
    Ok(step) => step,
    Err(e) => {
      warn!("Status check of payment order {} failed: {}", order_id, e);
      return record_pending(pool, order_id, &e.to_string(), max_attempts).await;
    },
  };

  let updated = match step {
    PollStep::Done(outcome) => {
      match &outcome {
        PollOutcome::Paid(_) => debug!("Payment order {} paid, releasing tokens", order_id),
        PollOutcome::Failed(status) => info!("Payment order {} failed: {}", order_id, status.message),
        PollOutcome::Cancelled(status) => info!("Payment order {} was cancelled: {}", order_id, status.message),
      }

      mutation::payments::apply_outcome(pool, gateway, order_id, &outcome).await?
    },
    PollStep::Pending(status) => record_pending(pool, order_id, &status.message, max_attempts).await?,
  };

  Ok(updated)
}

async fn record_pending(
  pool: &SqlitePool,
  order_id: &str,
  message: &str,
  max_attempts: u32,
) -> SettlementResult<Option<PaymentOrder>> {
  let Some(order) = mutation::payments::record_attempt(pool, order_id, message).await? else {
    return Ok(None);
  };

  if order.attempts < i64::from(max_attempts) {
    return Ok(Some(order));
  }

  warn!("Payment order {} not confirmed after {} checks", order_id, order.attempts);

  let message = format!("Payment not confirmed after {} status checks", order.attempts);
  let order = mutation::payments::finish(pool, order_id, PaymentStatus::TimedOut, None, &message).await?;

  Ok(order)
}
