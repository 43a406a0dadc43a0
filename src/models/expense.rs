use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::amount::require_positive;
use super::MonthKey;
use crate::error::{BudgetError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ExpenseCategory {
    #[serde(alias = "servicios")]
    Utilities,
    #[serde(alias = "préstamos", alias = "prestamos")]
    Loans,
    #[serde(alias = "tarjetas")]
    Cards,
    #[serde(alias = "otros")]
    Other,
}

impl ExpenseCategory {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Utilities => "Utilities",
            Self::Loans => "Loans",
            Self::Cards => "Cards",
            Self::Other => "Other",
        }
    }

    /// Accepts the English names and the labels older data was written with.
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "utilities" | "utility" | "servicios" => Some(Self::Utilities),
            "loans" | "loan" | "préstamos" | "prestamos" => Some(Self::Loans),
            "cards" | "card" | "tarjetas" => Some(Self::Cards),
            "other" | "otros" => Some(Self::Other),
            _ => None,
        }
    }

    pub(crate) fn all() -> &'static [ExpenseCategory] {
        &[Self::Utilities, Self::Loans, Self::Cards, Self::Other]
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// 1 is the most urgent, 5 the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub(crate) struct Priority(u8);

impl Priority {
    pub(crate) const HIGHEST: Priority = Priority(1);
    pub(crate) const LOWEST: Priority = Priority(5);

    pub(crate) fn new(value: u8) -> Result<Self> {
        if !(Self::HIGHEST.0..=Self::LOWEST.0).contains(&value) {
            return Err(BudgetError::InvalidInput(format!(
                "priority must be 1-5, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub(crate) fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u8> for Priority {
    type Error = BudgetError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(value: Priority) -> Self {
        value.0
    }
}

/// Day of month a payment falls due. Days past the end of a short month are
/// clamped to its last day when a due date is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub(crate) struct PaymentDay(u8);

impl PaymentDay {
    pub(crate) fn new(value: u8) -> Result<Self> {
        if !(1..=31).contains(&value) {
            return Err(BudgetError::InvalidInput(format!(
                "payment day must be 1-31, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub(crate) fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PaymentDay {
    type Error = BudgetError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PaymentDay> for u8 {
    fn from(value: PaymentDay) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct TemplateId(pub(crate) u64);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0.to_string())
    }
}

impl FromStr for TemplateId {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| BudgetError::InvalidInput(format!("'{s}' is not a template id")))
    }
}

/// Where a month's expense came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub(crate) enum Provenance {
    #[serde(rename_all = "camelCase")]
    TemplateDerived {
        template_id: TemplateId,
        month_key: MonthKey,
    },
    MonthLocal,
}

/// The user-editable part of an expense, shared by templates and month records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExpenseFields {
    pub(crate) name: String,
    pub(crate) amount: Decimal,
    pub(crate) category: ExpenseCategory,
    pub(crate) priority: Priority,
    pub(crate) payment_day: Option<PaymentDay>,
}

impl ExpenseFields {
    pub(crate) fn new(name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            name: name.into(),
            amount,
            category: ExpenseCategory::Other,
            priority: Priority::default(),
            payment_day: None,
        }
    }

    pub(crate) fn validated(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(BudgetError::InvalidInput("expense name is empty".into()));
        }
        self.amount = require_positive(self.amount)?;
        Ok(self)
    }
}

/// A recurring monthly obligation, copied into each new month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TemplateExpense {
    pub(crate) id: TemplateId,
    pub(crate) name: String,
    pub(crate) amount: Decimal,
    pub(crate) category: ExpenseCategory,
    pub(crate) priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) payment_day: Option<PaymentDay>,
}

impl TemplateExpense {
    pub(crate) fn new(id: TemplateId, fields: ExpenseFields) -> Self {
        Self {
            id,
            name: fields.name,
            amount: fields.amount,
            category: fields.category,
            priority: fields.priority,
            payment_day: fields.payment_day,
        }
    }

    pub(crate) fn fields(&self) -> ExpenseFields {
        ExpenseFields {
            name: self.name.clone(),
            amount: self.amount,
            category: self.category,
            priority: self.priority,
            payment_day: self.payment_day,
        }
    }

    pub(crate) fn apply(&mut self, fields: &ExpenseFields) {
        self.name = fields.name.clone();
        self.amount = fields.amount;
        self.category = fields.category;
        self.priority = fields.priority;
        self.payment_day = fields.payment_day;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExpenseRecord {
    pub(crate) id: String,
    pub(crate) provenance: Provenance,
    pub(crate) name: String,
    pub(crate) amount: Decimal,
    pub(crate) category: ExpenseCategory,
    pub(crate) priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) payment_day: Option<PaymentDay>,
}

impl ExpenseRecord {
    pub(crate) fn month_local(id: String, fields: ExpenseFields) -> Self {
        Self {
            id,
            provenance: Provenance::MonthLocal,
            name: fields.name,
            amount: fields.amount,
            category: fields.category,
            priority: fields.priority,
            payment_day: fields.payment_day,
        }
    }

    /// Copy a template into `month`. The id keeps the `{template}-{month}-{suffix}`
    /// shape so the template stays recognisable in exported data.
    pub(crate) fn materialize(template: &TemplateExpense, month: MonthKey, suffix: &str) -> Self {
        Self {
            id: format!("{}-{}-{}", template.id, month, suffix),
            provenance: Provenance::TemplateDerived {
                template_id: template.id,
                month_key: month,
            },
            name: template.name.clone(),
            amount: template.amount,
            category: template.category,
            priority: template.priority,
            payment_day: template.payment_day,
        }
    }

    pub(crate) fn template_id(&self) -> Option<TemplateId> {
        match self.provenance {
            Provenance::TemplateDerived { template_id, .. } => Some(template_id),
            Provenance::MonthLocal => None,
        }
    }

    pub(crate) fn is_derived_from(&self, template: TemplateId) -> bool {
        self.template_id() == Some(template)
    }

    pub(crate) fn fields(&self) -> ExpenseFields {
        ExpenseFields {
            name: self.name.clone(),
            amount: self.amount,
            category: self.category,
            priority: self.priority,
            payment_day: self.payment_day,
        }
    }

    /// Overwrite the editable fields; id and provenance are kept.
    pub(crate) fn apply(&mut self, fields: &ExpenseFields) {
        self.name = fields.name.clone();
        self.amount = fields.amount;
        self.category = fields.category;
        self.priority = fields.priority;
        self.payment_day = fields.payment_day;
    }
}
