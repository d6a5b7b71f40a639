use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Points spent against an order number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Withdrawal {
    pub order: String,
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub current: Decimal,
    pub withdrawn: Decimal,
}

impl Balance {
    /// Earned accruals minus everything withdrawn so far.
    pub fn from_totals(earned: Decimal, withdrawn: Decimal) -> Self {
        Self {
            current: earned - withdrawn,
            withdrawn,
        }
    }
}

/// What happened when a user uploaded an order number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    AlreadyUploaded,
    OwnedByAnotherUser,
}
