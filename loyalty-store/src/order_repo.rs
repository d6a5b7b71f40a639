use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;

use loyalty_core::repository::{LedgerRepository, OrderStore, UserRepository};
use loyalty_core::{Balance, Order, OrderResult, StoreError, StoreResult, SubmitOutcome, Withdrawal};

/// Postgres-backed implementation of every store port
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    number: String,
    username: String,
    status: String,
    accrual: Decimal,
    uploaded_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            number: row.number,
            owner: row.username,
            status: row.status.parse().map_err(StoreError::backend)?,
            accrual: row.accrual,
            uploaded_at: row.uploaded_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WithdrawalRow {
    order_number: String,
    sum: Decimal,
    processed_at: DateTime<Utc>,
}

const BALANCE_SQL: &str = r#"
    SELECT
        COALESCE((SELECT SUM(accrual) FROM orders WHERE username = $1 AND status = 'PROCESSED'), 0) AS earned,
        COALESCE((SELECT SUM(sum) FROM withdrawals WHERE username = $1), 0) AS withdrawn
"#;

const WITHDRAWAL_USED: &str = "withdrawal order number already used";

fn map_insert_error(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what.to_string()),
        _ => StoreError::backend(err),
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn fetch_pending(&self) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT number, username, status, accrual, uploaded_at FROM orders WHERE status NOT IN ('PROCESSED', 'INVALID') ORDER BY uploaded_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn update_orders(&self, batch: &[OrderResult]) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        for result in batch {
            // Terminal rows are never rewritten; replays affect nothing.
            sqlx::query(
                r#"
                UPDATE orders
                SET status = $1, accrual = $2
                WHERE number = $3 AND status NOT IN ('PROCESSED', 'INVALID')
                "#,
            )
            .bind(result.status.as_str())
            .bind(result.accrual)
            .bind(&result.number)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;
        }

        tx.commit().await.map_err(StoreError::backend)?;
        debug!("Applied {} accrual results", batch.len());
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> StoreResult<()> {
        let inserted = sqlx::query(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) ON CONFLICT (username) DO NOTHING",
        )
        .bind(login)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::UserExists(login.to_string()));
        }
        Ok(())
    }

    async fn password_hash(&self, login: &str) -> StoreResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE username = $1")
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)
    }
}

#[async_trait]
impl LedgerRepository for PgStore {
    async fn submit_order(&self, number: &str, owner: &str) -> StoreResult<SubmitOutcome> {
        let inserted = sqlx::query(
            "INSERT INTO orders (number, username, status, accrual) VALUES ($1, $2, 'NEW', 0) ON CONFLICT (number) DO NOTHING",
        )
        .bind(number)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if inserted.rows_affected() == 1 {
            return Ok(SubmitOutcome::Accepted);
        }

        let existing_owner = sqlx::query_scalar::<_, String>("SELECT username FROM orders WHERE number = $1")
            .bind(number)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        if existing_owner == owner {
            Ok(SubmitOutcome::AlreadyUploaded)
        } else {
            Ok(SubmitOutcome::OwnedByAnotherUser)
        }
    }

    async fn list_orders(&self, owner: &str) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT number, username, status, accrual, uploaded_at FROM orders WHERE username = $1 ORDER BY uploaded_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn balance(&self, owner: &str) -> StoreResult<Balance> {
        let (earned, withdrawn) = sqlx::query_as::<_, (Decimal, Decimal)>(BALANCE_SQL)
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(Balance::from_totals(earned, withdrawn))
    }

    async fn withdraw(&self, owner: &str, order: &str, sum: Decimal) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        // Serializes concurrent withdrawals of the same user.
        let locked = sqlx::query("SELECT id FROM users WHERE username = $1 FOR UPDATE")
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::backend)?;
        if locked.is_none() {
            return Err(StoreError::Conflict(format!("unknown user {owner}")));
        }

        let used = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM withdrawals WHERE order_number = $1)",
        )
        .bind(order)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::backend)?;
        if used {
            return Err(StoreError::Conflict(WITHDRAWAL_USED.to_string()));
        }

        let (earned, withdrawn) = sqlx::query_as::<_, (Decimal, Decimal)>(BALANCE_SQL)
            .bind(owner)
            .fetch_one(&mut *tx)
            .await
            .map_err(StoreError::backend)?;

        if Balance::from_totals(earned, withdrawn).current < sum {
            return Err(StoreError::InsufficientFunds);
        }

        sqlx::query("INSERT INTO withdrawals (username, order_number, sum) VALUES ($1, $2, $3)")
            .bind(owner)
            .bind(order)
            .bind(sum)
            .execute(&mut *tx)
            .await
            // A concurrent insert of the same number still lands here.
            .map_err(|e| map_insert_error(e, WITHDRAWAL_USED))?;

        tx.commit().await.map_err(StoreError::backend)
    }

    async fn list_withdrawals(&self, owner: &str) -> StoreResult<Vec<Withdrawal>> {
        let rows = sqlx::query_as::<_, WithdrawalRow>(
            "SELECT order_number, sum, processed_at FROM withdrawals WHERE username = $1 ORDER BY processed_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(rows
            .into_iter()
            .map(|row| Withdrawal {
                order: row.order_number,
                sum: row.sum,
                processed_at: row.processed_at,
            })
            .collect())
    }
}
