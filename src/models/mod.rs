mod amount;
mod expense;
mod income;
mod ledger;
mod month;

pub(crate) use amount::{parse_amount, require_positive};
pub(crate) use expense::{
    ExpenseCategory, ExpenseFields, ExpenseRecord, PaymentDay, Priority, Provenance, TemplateExpense,
    TemplateId,
};
pub(crate) use income::IncomeRecord;
pub(crate) use ledger::MonthLedgerEntry;
pub(crate) use month::MonthKey;
