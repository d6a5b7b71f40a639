pub mod order;
pub mod ledger;
pub mod luhn;
pub mod repository;
pub mod accrual;

pub use order::{Order, OrderResult, OrderStatus, WorkItem};
pub use ledger::{Balance, Withdrawal, SubmitOutcome};
pub use repository::{LedgerRepository, OrderStore, UserRepository};
pub use accrual::{AccrualError, AccrualGateway};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Order number failed checksum: {0}")]
    ChecksumError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Failures surfaced by any store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User already exists: {0}")]
    UserExists(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Storage backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
