pub mod contract;
pub mod error;
pub mod market;
pub mod portfolio;
pub mod scenario;
pub mod scheduler;
pub mod time_value;
pub mod types;

pub use error::DebtSimError;
pub use types::*;

/// Standard result type for all debtsim operations
pub type DebtSimResult<T> = Result<T, DebtSimError>;
