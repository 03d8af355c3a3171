pub type SwyptResult<T = ()> = Result<T, SwyptError>;

#[derive(thiserror::Error, Debug)]
pub enum SwyptError {
  #[error("Request to payment aggregator failed: {0}")]
  RequestError(#[from] reqwest::Error),

  #[error("Payment aggregator rejected request: {0}")]
  Rejected(String),

  #[error("Unexpected payment aggregator response: {0}")]
  UnexpectedResponse(String),

  #[error("Payment status check timed out after {0} attempts")]
  Timeout(u32),

  #[error("Payment polling cancelled")]
  Cancelled,
}
