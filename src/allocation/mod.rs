use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::calendar::fridays_in_month;
use crate::models::{ExpenseCategory, ExpenseRecord, IncomeRecord, MonthKey, MonthLedgerEntry};

/// Money is carried with two decimal places, rounded half-up.
pub(crate) const MONEY_DP: u32 = 2;

pub(crate) fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinancialStatus {
    Healthy,
    Warning,
    Critical,
}

impl FinancialStatus {
    pub(crate) fn classify(monthly_balance: Decimal, weekly_balance: Decimal) -> Self {
        if monthly_balance < Decimal::ZERO {
            Self::Critical
        } else if weekly_balance < Decimal::ZERO {
            Self::Warning
        } else {
            Self::Healthy
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for FinancialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Amount to set aside from each payday for one expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WeeklyShare {
    pub(crate) expense_id: String,
    pub(crate) amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AllocationResult {
    pub(crate) month: MonthKey,
    pub(crate) fridays_in_month: u32,
    pub(crate) weeks_recorded: usize,
    pub(crate) total_monthly_income: Decimal,
    pub(crate) average_weekly_salary: Decimal,
    pub(crate) total_monthly_expenses: Decimal,
    /// In ledger order.
    pub(crate) weekly_distribution: Vec<WeeklyShare>,
    pub(crate) total_weekly_needed: Decimal,
    pub(crate) weekly_balance: Decimal,
    pub(crate) monthly_balance: Decimal,
    pub(crate) status: FinancialStatus,
}

impl AllocationResult {
    pub(crate) fn share_for(&self, expense_id: &str) -> Option<Decimal> {
        self.weekly_distribution
            .iter()
            .find(|s| s.expense_id == expense_id)
            .map(|s| s.amount)
    }

    pub(crate) fn weeks_progress(&self) -> WeeksProgress {
        WeeksProgress::new(self.weeks_recorded, self.fridays_in_month)
    }
}

/// Recompute every derived figure for one month. Pure; call it after each mutation.
pub(crate) fn compute_allocation(entry: &MonthLedgerEntry, month: MonthKey) -> AllocationResult {
    let fridays = fridays_in_month(month);
    let total_monthly_income = total_income(&entry.weeks);
    let average_weekly_salary = average_weekly_salary(&entry.weeks);
    let total_monthly_expenses = total_expenses(&entry.expenses);
    let weekly_distribution = weekly_distribution(&entry.expenses, fridays);
    let total_weekly_needed: Decimal = weekly_distribution.iter().map(|s| s.amount).sum();
    let weekly_balance = average_weekly_salary - total_weekly_needed;
    let monthly_balance = total_monthly_income - total_monthly_expenses;

    AllocationResult {
        month,
        fridays_in_month: fridays,
        weeks_recorded: entry.weeks.len(),
        total_monthly_income,
        average_weekly_salary,
        total_monthly_expenses,
        weekly_distribution,
        total_weekly_needed,
        weekly_balance,
        monthly_balance,
        status: FinancialStatus::classify(monthly_balance, weekly_balance),
    }
}

pub(crate) fn total_income(weeks: &[IncomeRecord]) -> Decimal {
    weeks.iter().map(|w| w.amount).sum()
}

/// Zero when no weeks are recorded.
pub(crate) fn average_weekly_salary(weeks: &[IncomeRecord]) -> Decimal {
    if weeks.is_empty() {
        return Decimal::ZERO;
    }
    round_money(total_income(weeks) / Decimal::from(weeks.len()))
}

pub(crate) fn total_expenses(expenses: &[ExpenseRecord]) -> Decimal {
    expenses.iter().map(|e| e.amount).sum()
}

/// Flat split of every expense across the month's paydays. Priority and
/// payment day do not influence it. Empty when there are no paydays or the
/// expenses sum to zero.
pub(crate) fn weekly_distribution(expenses: &[ExpenseRecord], fridays: u32) -> Vec<WeeklyShare> {
    if fridays == 0 || total_expenses(expenses) <= Decimal::ZERO {
        return Vec::new();
    }
    let paydays = Decimal::from(fridays);
    expenses
        .iter()
        .map(|e| WeeklyShare {
            expense_id: e.id.clone(),
            amount: round_money(e.amount / paydays),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WeeksProgress {
    pub(crate) recorded: usize,
    pub(crate) expected: u32,
    pub(crate) missing: u32,
    /// Rounded to the nearest whole percent; can exceed 100.
    pub(crate) percent: u32,
}

impl WeeksProgress {
    pub(crate) fn new(recorded: usize, expected: u32) -> Self {
        let recorded_u32 = u32::try_from(recorded).unwrap_or(u32::MAX);
        let percent = if expected == 0 {
            0
        } else {
            (Decimal::from(recorded) * Decimal::ONE_HUNDRED / Decimal::from(expected))
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_u32()
                .unwrap_or(0)
        };
        Self {
            recorded,
            expected,
            missing: expected.saturating_sub(recorded_u32),
            percent,
        }
    }
}

/// Monthly totals per category, in declaration order, skipping empty categories.
pub(crate) fn totals_by_category(expenses: &[ExpenseRecord]) -> Vec<(ExpenseCategory, Decimal)> {
    ExpenseCategory::all()
        .iter()
        .filter_map(|category| {
            let matching: Vec<&ExpenseRecord> =
                expenses.iter().filter(|e| e.category == *category).collect();
            if matching.is_empty() {
                None
            } else {
                Some((*category, matching.iter().map(|e| e.amount).sum()))
            }
        })
        .collect()
}

/// The `n` largest expenses; ties keep ledger order.
pub(crate) fn top_expenses(expenses: &[ExpenseRecord], n: usize) -> Vec<&ExpenseRecord> {
    let mut sorted: Vec<&ExpenseRecord> = expenses.iter().collect();
    sorted.sort_by(|a, b| b.amount.cmp(&a.amount));
    sorted.truncate(n);
    sorted
}

/// Display order only.
pub(crate) fn by_priority(expenses: &[ExpenseRecord]) -> Vec<&ExpenseRecord> {
    let mut sorted: Vec<&ExpenseRecord> = expenses.iter().collect();
    sorted.sort_by_key(|e| e.priority);
    sorted
}
