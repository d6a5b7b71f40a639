use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use loyalty_core::repository::{LedgerRepository, OrderStore, UserRepository};
use loyalty_core::{Balance, Order, OrderResult, OrderStatus, StoreError, StoreResult, SubmitOutcome, Withdrawal};

#[derive(Default)]
struct Tables {
    users: HashMap<String, String>,
    orders: HashMap<String, Order>,
    withdrawals: Vec<(String, Withdrawal)>,
}

/// In-process store with the same semantics as [`crate::PgStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_updates: AtomicBool,
    applied_batches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an order directly, bypassing the submission path.
    pub async fn insert_order(&self, order: Order) {
        self.tables.write().await.orders.insert(order.number.clone(), order);
    }

    pub async fn order(&self, number: &str) -> Option<Order> {
        self.tables.read().await.orders.get(number).cloned()
    }

    /// Make every following `update_orders` call fail until switched off.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of batches written successfully.
    pub fn applied_batches(&self) -> usize {
        self.applied_batches.load(Ordering::SeqCst)
    }

    fn totals(tables: &Tables, owner: &str) -> Balance {
        let earned: Decimal = tables
            .orders
            .values()
            .filter(|o| o.owner == owner && o.status == OrderStatus::Processed)
            .map(|o| o.accrual)
            .sum();
        let withdrawn: Decimal = tables
            .withdrawals
            .iter()
            .filter(|(user, _)| user == owner)
            .map(|(_, w)| w.sum)
            .sum();
        Balance::from_totals(earned, withdrawn)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn fetch_pending(&self) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut pending: Vec<Order> = tables.orders.values().filter(|o| o.is_pending()).cloned().collect();
        pending.sort_by_key(|o| o.uploaded_at);
        Ok(pending)
    }

    async fn update_orders(&self, batch: &[OrderResult]) -> StoreResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("update_orders failure injected".into()));
        }

        let mut tables = self.tables.write().await;
        for result in batch {
            if let Some(order) = tables.orders.get_mut(&result.number) {
                order.apply(result);
            }
        }
        self.applied_batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(login) {
            return Err(StoreError::UserExists(login.to_string()));
        }
        tables.users.insert(login.to_string(), password_hash.to_string());
        Ok(())
    }

    async fn password_hash(&self, login: &str) -> StoreResult<Option<String>> {
        Ok(self.tables.read().await.users.get(login).cloned())
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn submit_order(&self, number: &str, owner: &str) -> StoreResult<SubmitOutcome> {
        let mut tables = self.tables.write().await;
        match tables.orders.get(number) {
            Some(existing) if existing.owner == owner => Ok(SubmitOutcome::AlreadyUploaded),
            Some(_) => Ok(SubmitOutcome::OwnedByAnotherUser),
            None => {
                tables
                    .orders
                    .insert(number.to_string(), Order::new(number.to_string(), owner.to_string()));
                Ok(SubmitOutcome::Accepted)
            }
        }
    }

    async fn list_orders(&self, owner: &str) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables.orders.values().filter(|o| o.owner == owner).cloned().collect();
        orders.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(orders)
    }

    async fn balance(&self, owner: &str) -> StoreResult<Balance> {
        let tables = self.tables.read().await;
        Ok(Self::totals(&tables, owner))
    }

    async fn withdraw(&self, owner: &str, order: &str, sum: Decimal) -> StoreResult<()> {
        // Reused number is reported before insufficient funds, as in `PgStore`.
        let mut tables = self.tables.write().await;
        if tables.withdrawals.iter().any(|(_, w)| w.order == order) {
            return Err(StoreError::Conflict("withdrawal order number already used".to_string()));
        }
        if Self::totals(&tables, owner).current < sum {
            return Err(StoreError::InsufficientFunds);
        }
        tables.withdrawals.push((
            owner.to_string(),
            Withdrawal {
                order: order.to_string(),
                sum,
                processed_at: Utc::now(),
            },
        ));
        Ok(())
    }

    async fn list_withdrawals(&self, owner: &str) -> StoreResult<Vec<Withdrawal>> {
        let tables = self.tables.read().await;
        let mut withdrawals: Vec<Withdrawal> = tables
            .withdrawals
            .iter()
            .filter(|(user, _)| user == owner)
            .map(|(_, w)| w.clone())
            .collect();
        withdrawals.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(withdrawals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn processed(number: &str, accrual: Decimal) -> OrderResult {
        OrderResult {
            number: number.to_string(),
            status: OrderStatus::Processed,
            accrual,
        }
    }

    #[tokio::test]
    async fn test_submit_outcomes() {
        let store = MemoryStore::new();
        assert_eq!(store.submit_order("79927398713", "alice").await.unwrap(), SubmitOutcome::Accepted);
        assert_eq!(store.submit_order("79927398713", "alice").await.unwrap(), SubmitOutcome::AlreadyUploaded);
        assert_eq!(store.submit_order("79927398713", "bob").await.unwrap(), SubmitOutcome::OwnedByAnotherUser);
    }

    #[tokio::test]
    async fn test_pending_excludes_terminal_orders() {
        let store = MemoryStore::new();
        store.submit_order("79927398713", "alice").await.unwrap();
        store.submit_order("12345678903", "alice").await.unwrap();
        store.update_orders(&[processed("12345678903", dec!(10))]).await.unwrap();

        let pending = store.fetch_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].number, "79927398713");
    }

    #[tokio::test]
    async fn test_update_twice_equals_once() {
        let store = MemoryStore::new();
        store.submit_order("79927398713", "alice").await.unwrap();
        let batch = vec![processed("79927398713", dec!(500))];

        store.update_orders(&batch).await.unwrap();
        let once = store.order("79927398713").await.unwrap();
        store.update_orders(&batch).await.unwrap();
        let twice = store.order("79927398713").await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.status, OrderStatus::Processed);
        assert_eq!(twice.accrual, dec!(500));
    }

    #[tokio::test]
    async fn test_terminal_order_is_not_rewritten() {
        let store = MemoryStore::new();
        store.submit_order("79927398713", "alice").await.unwrap();
        store.update_orders(&[processed("79927398713", dec!(500))]).await.unwrap();

        let regress = OrderResult {
            number: "79927398713".to_string(),
            status: OrderStatus::Processing,
            accrual: Decimal::ZERO,
        };
        store.update_orders(&[regress]).await.unwrap();

        let order = store.order("79927398713").await.unwrap();
        assert_eq!(order.status, OrderStatus::Processed);
        assert_eq!(order.accrual, dec!(500));
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_state_untouched() {
        let store = MemoryStore::new();
        store.submit_order("79927398713", "alice").await.unwrap();
        store.set_fail_updates(true);

        assert!(store.update_orders(&[processed("79927398713", dec!(1))]).await.is_err());
        assert_eq!(store.order("79927398713").await.unwrap().status, OrderStatus::New);
        assert_eq!(store.applied_batches(), 0);
    }

    #[tokio::test]
    async fn test_balance_and_withdrawals() {
        let store = MemoryStore::new();
        store.submit_order("79927398713", "alice").await.unwrap();
        store.submit_order("12345678903", "alice").await.unwrap();
        store
            .update_orders(&[processed("79927398713", dec!(729.98)), processed("12345678903", dec!(20))])
            .await
            .unwrap();

        store.withdraw("alice", "2377225624", dec!(700)).await.unwrap();
        let balance = store.balance("alice").await.unwrap();
        assert_eq!(balance.current, dec!(49.98));
        assert_eq!(balance.withdrawn, dec!(700));

        let err = store.withdraw("alice", "4561261212345467", dec!(100)).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds));

        let withdrawals = store.list_withdrawals("alice").await.unwrap();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].order, "2377225624");
    }

    #[tokio::test]
    async fn test_withdrawal_number_is_single_use() {
        let store = MemoryStore::new();
        store.submit_order("79927398713", "alice").await.unwrap();
        store.update_orders(&[processed("79927398713", dec!(100))]).await.unwrap();

        store.withdraw("alice", "2377225624", dec!(10)).await.unwrap();
        let err = store.withdraw("alice", "2377225624", dec!(10)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reused_number_wins_over_insufficient_funds() {
        let store = MemoryStore::new();
        store.submit_order("79927398713", "alice").await.unwrap();
        store.update_orders(&[processed("79927398713", dec!(100))]).await.unwrap();
        store.withdraw("alice", "2377225624", dec!(90)).await.unwrap();

        let err = store.withdraw("alice", "2377225624", dec!(50)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.balance("alice").await.unwrap().current, dec!(10));
    }
}
