use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::{ExpenseRecord, MonthKey, PaymentDay};

/// Number of paydays (Fridays) between the 1st and the last day of `month`.
pub(crate) fn fridays_in_month(month: MonthKey) -> u32 {
    let last = month.last_day();
    month
        .first_day()
        .iter_days()
        .take_while(|day| *day <= last)
        .filter(|day| day.weekday() == Weekday::Fri)
        .count() as u32
}

/// Due date of `day` in `month`; days the month does not have fall on its last day.
pub(crate) fn payment_date(month: MonthKey, day: PaymentDay) -> NaiveDate {
    let clamped = u32::from(day.get()).min(month.days_in_month());
    NaiveDate::from_ymd_opt(month.year(), month.month(), clamped).unwrap_or_else(|| month.last_day())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PaymentStatus {
    Overdue,
    Today,
    Soon,
    Upcoming,
    Later,
}

impl PaymentStatus {
    pub(crate) fn from_days_until(days: i64) -> Self {
        match days {
            d if d < 0 => Self::Overdue,
            0 => Self::Today,
            1..=3 => Self::Soon,
            4..=7 => Self::Upcoming,
            _ => Self::Later,
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Overdue => "Overdue",
            Self::Today => "Today",
            Self::Soon => "Soon",
            Self::Upcoming => "Upcoming",
            Self::Later => "Later",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct UpcomingPayment<'a> {
    pub(crate) expense: &'a ExpenseRecord,
    pub(crate) due: NaiveDate,
    pub(crate) days_until: i64,
    pub(crate) status: PaymentStatus,
}

/// Expenses with a payment day, ordered by due date then priority.
///
/// When `month` is the month containing `today`, payments whose day has
/// already passed roll over to the following month.
pub(crate) fn upcoming_payments<'a>(
    expenses: &'a [ExpenseRecord],
    month: MonthKey,
    today: NaiveDate,
) -> Vec<UpcomingPayment<'a>> {
    let is_current = MonthKey::from_date(today) == month;
    let mut payments: Vec<UpcomingPayment<'a>> = expenses
        .iter()
        .filter_map(|expense| {
            let day = expense.payment_day?;
            let mut due = payment_date(month, day);
            if is_current && due < today {
                due = payment_date(month.next(), day);
            }
            let days_until = (due - today).num_days();
            Some(UpcomingPayment {
                expense,
                due,
                days_until,
                status: PaymentStatus::from_days_until(days_until),
            })
        })
        .collect();
    payments.sort_by(|a, b| {
        a.due
            .cmp(&b.due)
            .then_with(|| a.expense.priority.cmp(&b.expense.priority))
    });
    payments
}
