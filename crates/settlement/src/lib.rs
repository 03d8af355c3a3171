pub mod error;
pub mod system;

pub use error::{SettlementError, SettlementResult};
pub use system::SettlementSystem;
