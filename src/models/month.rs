use chrono::{Datelike, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BudgetError;

/// A calendar month, rendered as `"YYYY-MM"`.
///
/// Field order makes the derived `Ord` chronological, which for four-digit
/// years is also the order of the rendered strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub(crate) struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub(crate) fn new(year: i32, month: u32) -> Result<Self, BudgetError> {
        if !(1..=12).contains(&month) {
            return Err(BudgetError::InvalidInput(format!(
                "month must be 1-12, got {month}"
            )));
        }
        if !(1..=9999).contains(&year) {
            return Err(BudgetError::InvalidInput(format!(
                "year must be 1-9999, got {year}"
            )));
        }
        Ok(Self { year, month })
    }

    pub(crate) fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub(crate) fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub(crate) fn year(&self) -> i32 {
        self.year
    }

    pub(crate) fn month(&self) -> u32 {
        self.month
    }

    pub(crate) fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// Day zero of the following month.
    pub(crate) fn last_day(&self) -> NaiveDate {
        self.first_day()
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or_else(|| self.first_day())
    }

    pub(crate) fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }

    pub(crate) fn next(&self) -> Self {
        self.shift(1)
    }

    pub(crate) fn prev(&self) -> Self {
        self.shift(-1)
    }

    fn shift(&self, delta: i32) -> Self {
        let base = self.first_day();
        let moved = if delta >= 0 {
            base.checked_add_months(Months::new(delta.unsigned_abs()))
        } else {
            base.checked_sub_months(Months::new(delta.unsigned_abs()))
        };
        moved
            .map(Self::from_date)
            .filter(|m| (1..=9999).contains(&m.year))
            .unwrap_or(*self)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BudgetError::InvalidInput(format!("invalid month '{s}', use YYYY-MM"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if year.len() != 4 || month.len() != 2 || !all_digits(year) || !all_digits(month) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for MonthKey {
    type Error = BudgetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.to_string()
    }
}
