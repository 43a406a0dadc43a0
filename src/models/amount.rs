use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{BudgetError, Result};

/// Parse a user-typed money amount. Currency symbols and thousands separators
/// are stripped; the result must be strictly positive.
pub(crate) fn parse_amount(s: &str) -> Result<Decimal> {
    let cleaned = s.replace(['$', ','], "").trim().to_string();
    if cleaned.is_empty() {
        return Err(BudgetError::InvalidInput("amount is empty".into()));
    }
    let amount = Decimal::from_str(&cleaned)
        .map_err(|_| BudgetError::InvalidInput(format!("'{s}' is not a number")))?;
    require_positive(amount)
}

pub(crate) fn require_positive(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(BudgetError::InvalidInput(format!(
            "amount must be greater than zero, got {amount}"
        )));
    }
    Ok(amount)
}
