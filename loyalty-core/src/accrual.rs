use std::time::Duration;

use async_trait::async_trait;

use crate::order::OrderResult;

/// How an accrual lookup failed. Every variant leaves the order pending.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccrualError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("transient upstream failure: {0}")]
    Transient(String),
    #[error("malformed accrual response: {0}")]
    Malformed(String),
    #[error("order not registered upstream")]
    NotRegistered,
}

impl AccrualError {
    /// How long the caller must pause before its next request, if at all.
    pub fn pause(&self) -> Option<Duration> {
        match self {
            AccrualError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// External accrual-calculation service
#[async_trait]
pub trait AccrualGateway: Send + Sync {
    async fn request(&self, order_number: &str) -> Result<OrderResult, AccrualError>;
}
