use serde::{Deserialize, Serialize};

use super::{ExpenseRecord, IncomeRecord};

/// Everything recorded for one calendar month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MonthLedgerEntry {
    #[serde(default)]
    pub(crate) weeks: Vec<IncomeRecord>,
    #[serde(default)]
    pub(crate) expenses: Vec<ExpenseRecord>,
    /// Set the first time the month holds an expense. Template propagation
    /// never fires for a seeded month, even after all its expenses are removed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub(crate) seeded: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl MonthLedgerEntry {
    /// True when nothing has been recorded for the month.
    pub(crate) fn is_empty(&self) -> bool {
        self.weeks.is_empty() && self.expenses.is_empty()
    }

    pub(crate) fn income(&self, id: u64) -> Option<&IncomeRecord> {
        self.weeks.iter().find(|w| w.id == id)
    }

    pub(crate) fn expense(&self, id: &str) -> Option<&ExpenseRecord> {
        self.expenses.iter().find(|e| e.id == id)
    }

    pub(crate) fn accepts_templates(&self) -> bool {
        self.expenses.is_empty() && !self.seeded
    }
}
