use imara_api::error::ApiError;
use imara_swypt::SwyptError;

pub type SettlementResult<T = ()> = Result<T, SettlementError>;

#[derive(thiserror::Error, Debug)]
pub enum SettlementError {
  #[error("Failed to update payment order: {0}")]
  StoreError(#[from] ApiError),

  #[error("Payment aggregator error: {0}")]
  GatewayError(#[from] SwyptError),
}
