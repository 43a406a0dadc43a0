use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One payday's take-home pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct IncomeRecord {
    pub(crate) id: u64,
    pub(crate) amount: Decimal,
    #[serde(rename = "date")]
    pub(crate) recorded_at: DateTime<Utc>,
}

impl IncomeRecord {
    pub(crate) fn new(id: u64, amount: Decimal) -> Self {
        Self {
            id,
            amount,
            recorded_at: Utc::now(),
        }
    }
}
