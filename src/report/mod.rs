use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;

use crate::allocation::{by_priority, AllocationResult};
use crate::models::MonthLedgerEntry;

/// Format a decimal amount with thousand separators and 2 decimal places.
/// e.g. `1234567.89` → `"$1,234,567.89"`
pub(crate) fn format_amount(val: Decimal) -> String {
    let abs = val.abs();
    let formatted = format!("{abs:.2}");
    let mut parts = formatted.split('.');
    let int_part = parts.next().unwrap_or("0");
    let dec_part = parts.next().unwrap_or("00");

    let with_commas: String = int_part
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(",");

    if val < Decimal::ZERO {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

/// Truncate to `max` characters, ending in "…" when cut.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max - 1).collect();
    format!("{kept}…")
}

/// One line of the weekly plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlanRow {
    pub(crate) name: String,
    pub(crate) category: String,
    pub(crate) priority: u8,
    pub(crate) payment_day: Option<u8>,
    pub(crate) monthly: Decimal,
    pub(crate) weekly: Decimal,
}

/// Plan lines in priority order. Expenses without a weekly share (no paydays)
/// show a zero set-aside.
pub(crate) fn plan_rows(result: &AllocationResult, entry: &MonthLedgerEntry) -> Vec<PlanRow> {
    by_priority(&entry.expenses)
        .into_iter()
        .map(|e| PlanRow {
            name: e.name.clone(),
            category: e.category.to_string(),
            priority: e.priority.get(),
            payment_day: e.payment_day.map(|d| d.get()),
            monthly: e.amount,
            weekly: result.share_for(&e.id).unwrap_or(Decimal::ZERO),
        })
        .collect()
}

/// Write the month's plan as CSV. Returns the number of expense lines.
pub(crate) fn export_plan_csv(path: &Path, result: &AllocationResult, entry: &MonthLedgerEntry) -> Result<usize> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    wtr.write_record([
        "Expense",
        "Category",
        "Priority",
        "Payment day",
        "Monthly",
        "Weekly set-aside",
    ])?;

    let rows = plan_rows(result, entry);
    for row in &rows {
        wtr.write_record([
            row.name.clone(),
            row.category.clone(),
            row.priority.to_string(),
            row.payment_day.map(|d| d.to_string()).unwrap_or_default(),
            format!("{:.2}", row.monthly),
            format!("{:.2}", row.weekly),
        ])?;
    }

    let summary = [
        ("Total", result.total_monthly_expenses, result.total_weekly_needed),
        ("Income", result.total_monthly_income, result.average_weekly_salary),
        ("Balance", result.monthly_balance, result.weekly_balance),
    ];
    for (label, monthly, weekly) in summary {
        wtr.write_record([
            label.to_string(),
            String::new(),
            String::new(),
            String::new(),
            format!("{monthly:.2}"),
            format!("{weekly:.2}"),
        ])?;
    }
    wtr.write_record([
        "Status".to_string(),
        result.status.to_string(),
        String::new(),
        String::new(),
        result.month.to_string(),
        format!("{} paydays", result.fridays_in_month),
    ])?;
    wtr.flush().context("Failed to write CSV file")?;
    Ok(rows.len())
}
