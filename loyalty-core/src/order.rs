use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order status in the accrual lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    /// INVALID and PROCESSED are final; such orders leave the pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    /// Transitions only ever move toward a terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match self {
            OrderStatus::New | OrderStatus::Processing => next != OrderStatus::New,
            OrderStatus::Invalid | OrderStatus::Processed => *self == next,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(crate::CoreError::ValidationError(format!("unknown order status {other}"))),
        }
    }
}

/// A loyalty order uploaded by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub number: String,
    pub owner: String,
    pub status: OrderStatus,
    pub accrual: Decimal,
    pub uploaded_at: DateTime<Utc>,
}

impl Order {
    pub fn new(number: String, owner: String) -> Self {
        Self {
            number,
            owner,
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
            uploaded_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Apply an accrual outcome, refusing to move a terminal order.
    /// Returns whether the order changed.
    pub fn apply(&mut self, result: &OrderResult) -> bool {
        if !self.status.can_transition_to(result.status) {
            return false;
        }
        if self.status.is_terminal() {
            // Re-applying the same terminal outcome is a no-op.
            return false;
        }
        let changed = self.status != result.status || self.accrual != result.accrual;
        self.status = result.status;
        self.accrual = result.accrual;
        changed
    }
}

/// The part of an order queued for an accrual lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub number: String,
    pub owner: String,
}

impl From<&Order> for WorkItem {
    fn from(order: &Order) -> Self {
        Self {
            number: order.number.clone(),
            owner: order.owner.clone(),
        }
    }
}

/// Outcome of one accrual lookup, waiting to be written back
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    pub number: String,
    pub status: OrderStatus,
    pub accrual: Decimal,
}
