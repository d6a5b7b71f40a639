use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::ledger::{Balance, SubmitOutcome, Withdrawal};
use crate::order::{Order, OrderResult};
use crate::StoreResult;

/// Order access needed by the accrual reconciliation pipeline
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Every order whose status is not terminal.
    async fn fetch_pending(&self) -> StoreResult<Vec<Order>>;

    /// Apply a batch of accrual outcomes as one all-or-nothing write.
    /// Terminal orders are left untouched, so replaying a batch is harmless.
    async fn update_orders(&self, batch: &[OrderResult]) -> StoreResult<()>;
}

/// Credentials store
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, login: &str, password_hash: &str) -> StoreResult<()>;

    async fn password_hash(&self, login: &str) -> StoreResult<Option<String>>;
}

/// Per-user orders and the points ledger
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn submit_order(&self, number: &str, owner: &str) -> StoreResult<SubmitOutcome>;

    /// Orders of `owner`, newest first.
    async fn list_orders(&self, owner: &str) -> StoreResult<Vec<Order>>;

    async fn balance(&self, owner: &str) -> StoreResult<Balance>;

    /// Fails with `StoreError::InsufficientFunds` when `sum` exceeds the current balance.
    async fn withdraw(&self, owner: &str, order: &str, sum: Decimal) -> StoreResult<()>;

    /// Withdrawals of `owner`, newest first.
    async fn list_withdrawals(&self, owner: &str) -> StoreResult<Vec<Withdrawal>>;
}
