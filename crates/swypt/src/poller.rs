use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{
  client::{OrderGateway, OrderState, OrderStatus},
  error::{SwyptError, SwyptResult},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
  /// M-Pesa payment confirmed. The on-ramped tokens are released by a separate crypto transfer.
  Paid(OrderStatus),
  Failed(OrderStatus),
  Cancelled(OrderStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
  Pending(OrderStatus),
  Done(PollOutcome),
}

/// Polls an on-ramp order until it is paid, fails, runs out of attempts or is cancelled.
#[derive(Debug, Clone, Copy)]
pub struct PaymentPoller {
  interval: Duration,
  max_attempts: u32,
}

impl Default for PaymentPoller {
  fn default() -> Self {
    Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
  }
}

impl PaymentPoller {
  pub fn new(interval: Duration, max_attempts: u32) -> Self {
    Self { interval, max_attempts }
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_attempts
  }

  /// Performs a single status check. Never moves funds.
  pub async fn check_once<G>(gateway: &G, order_id: &str) -> SwyptResult<PollStep>
  where
    G: OrderGateway + ?Sized,
  {
    let status = gateway.order_status(order_id).await?;

    let step = match status.status {
      OrderState::Success => PollStep::Done(PollOutcome::Paid(status)),
      OrderState::Failed => PollStep::Done(PollOutcome::Failed(status)),
      OrderState::Cancelled => PollStep::Done(PollOutcome::Cancelled(status)),
      OrderState::Pending => PollStep::Pending(status),
    };

    Ok(step)
  }

  #[instrument(skip(self, gateway, cancel_token))]
  pub async fn poll<G>(&self, gateway: &G, order_id: &str, cancel_token: &CancellationToken) -> SwyptResult<PollOutcome>
  where
    G: OrderGateway + ?Sized,
  {
    for attempt in 1..=self.max_attempts {
      if let PollStep::Done(outcome) = Self::check_once(gateway, order_id).await? {
        return Ok(outcome);
      }

      debug!("Order {} still pending after attempt {}", order_id, attempt);

      if attempt == self.max_attempts {
        break;
      }

      tokio::select! {
        _ = cancel_token.cancelled() => return Err(SwyptError::Cancelled),
        _ = sleep(self.interval) => {},
      }
    }

    Err(SwyptError::Timeout(self.max_attempts))
  }
}
