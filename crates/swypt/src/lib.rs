//! Client for the Swypt M-Pesa on-ramp used to turn fiat stakes into tokens.

pub mod client;
pub mod error;
pub mod phone;
pub mod poller;

pub use client::{OnrampOrder, OrderGateway, OrderState, OrderStatus, QuoteRequest, SwyptClient, SwyptConfig, TransferReceipt};
pub use error::{SwyptError, SwyptResult};
pub use phone::normalize_phone;
pub use poller::{PaymentPoller, PollOutcome, PollStep};
