use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by the ledger core. None of them are fatal: the caller
/// decides whether to retry, prompt the user, or report.
#[derive(Debug, Error)]
pub(crate) enum BudgetError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),
    #[error("Identity error: {0}")]
    Identity(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

pub(crate) type Result<T> = std::result::Result<T, BudgetError>;
