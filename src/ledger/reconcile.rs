//! Edits and deletes that target either one month's record or a template and
//! every record materialized from it.

use std::collections::BTreeMap;
use tracing::info;

use super::{paths, written, LedgerStore};
use crate::error::{BudgetError, Result};
use crate::models::{ExpenseFields, ExpenseRecord, MonthKey, MonthLedgerEntry, TemplateExpense, TemplateId};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EditScope {
    /// Only the record in the active month.
    Month,
    /// The template and its copies in every month.
    Template,
}

impl std::str::FromStr for EditScope {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "month" => Ok(Self::Month),
            "template" => Ok(Self::Template),
            other => Err(BudgetError::InvalidInput(format!(
                "scope must be 'month' or 'template', got '{other}'"
            ))),
        }
    }
}

impl<S: DocumentStore> LedgerStore<S> {
    pub(crate) fn template(&self, id: TemplateId) -> Option<&TemplateExpense> {
        self.templates.iter().find(|t| t.id == id)
    }

    fn save_template(&mut self, template: &TemplateExpense) -> Result<()> {
        let path = paths::templates(&self.root);
        let value = serde_json::to_value(template).map_err(StoreError::from)?;
        written(
            self.store
                .write_collection_item(&path, &template.id.to_string(), value),
            "template",
        )
    }

    /// Create a template and materialize it into the active month right away.
    /// Returns the template id and the id of the month's copy.
    pub(crate) fn add_template_expense(&mut self, fields: ExpenseFields) -> Result<(TemplateId, String)> {
        let fields = fields.validated()?;
        let template = TemplateExpense::new(TemplateId(self.ids.next_id()), fields);
        self.templates.push(template.clone());
        let saved = self.save_template(&template);

        let month = self.current;
        let mut record_id = String::new();
        let added = self.update_ledger(month, |entry| {
            let mut next = entry.clone();
            let suffix = super::unique_suffix(&next);
            let record = ExpenseRecord::materialize(&template, month, &suffix);
            record_id = record.id.clone();
            next.expenses.push(record);
            next
        });
        let propagated = self.propagate_templates();
        saved?;
        added?;
        propagated?;
        info!(template = %template.id, %month, "template expense added");
        Ok((template.id, record_id))
    }

    /// Add an expense that exists only in the active month.
    pub(crate) fn add_month_expense(&mut self, fields: ExpenseFields) -> Result<String> {
        let fields = fields.validated()?;
        let id = self.ids.next_id().to_string();
        let record = ExpenseRecord::month_local(id.clone(), fields);
        self.update_ledger(self.current, |entry| {
            let mut next = entry.clone();
            next.expenses.push(record);
            next
        })?;
        Ok(id)
    }

    /// Template a record of the active month was materialized from. An id that
    /// is not in the month may name a template directly.
    pub(crate) fn resolve_template(&self, id: &str) -> Result<TemplateId> {
        if let Some(record) = self.months.get(&self.current).and_then(|e| e.expense(id)) {
            return record.template_id().ok_or_else(|| {
                BudgetError::InvalidInput(format!("expense {id} is not linked to a template"))
            });
        }
        let template_id: TemplateId = id
            .parse()
            .map_err(|_| BudgetError::NotFound(format!("expense {id}")))?;
        self.template(template_id)
            .map(|t| t.id)
            .ok_or_else(|| BudgetError::NotFound(format!("template {template_id}")))
    }

    /// Returns how many records were changed.
    pub(crate) fn edit_expense(&mut self, id: &str, fields: ExpenseFields, scope: EditScope) -> Result<usize> {
        match scope {
            EditScope::Month => {
                let fields = fields.validated()?;
                self.try_update_ledger(self.current, |entry| {
                    let mut next = entry.clone();
                    let record = next
                        .expenses
                        .iter_mut()
                        .find(|e| e.id == id)
                        .ok_or_else(|| BudgetError::NotFound(format!("expense {id}")))?;
                    record.apply(&fields);
                    Ok(next)
                })?;
                Ok(1)
            }
            EditScope::Template => {
                let template_id = self.resolve_template(id)?;
                self.edit_template(template_id, fields)
            }
        }
    }

    /// Update a template and rewrite every record derived from it, in every
    /// month, keeping each record's id. Returns the number of records rewritten.
    pub(crate) fn edit_template(&mut self, id: TemplateId, fields: ExpenseFields) -> Result<usize> {
        let fields = fields.validated()?;
        let template = self
            .templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| BudgetError::NotFound(format!("template {id}")))?;
        template.apply(&fields);
        let template = template.clone();

        let mut rewritten = 0;
        let changed: BTreeMap<MonthKey, MonthLedgerEntry> = self
            .months
            .iter()
            .filter(|(_, entry)| entry.expenses.iter().any(|e| e.is_derived_from(id)))
            .map(|(month, entry)| {
                let mut next = entry.clone();
                for record in next.expenses.iter_mut().filter(|e| e.is_derived_from(id)) {
                    record.apply(&fields);
                    rewritten += 1;
                }
                (*month, next)
            })
            .collect();
        let months = changed.len();

        let saved = self.save_template(&template);
        let committed = self.commit(changed);
        saved?;
        committed?;
        info!(template = %id, records = rewritten, months, "template edited");
        Ok(rewritten)
    }

    /// Returns how many records were removed. The template scope requires
    /// `confirmed`, since it removes records from every month.
    pub(crate) fn delete_expense(&mut self, id: &str, scope: EditScope, confirmed: bool) -> Result<usize> {
        match scope {
            EditScope::Month => {
                self.try_update_ledger(self.current, |entry| {
                    if entry.expense(id).is_none() {
                        return Err(BudgetError::NotFound(format!("expense {id}")));
                    }
                    let mut next = entry.clone();
                    next.expenses.retain(|e| e.id != id);
                    Ok(next)
                })?;
                Ok(1)
            }
            EditScope::Template => {
                let template_id = self.resolve_template(id)?;
                self.delete_template(template_id, confirmed)
            }
        }
    }

    /// Remove a template and every record derived from it, in every month.
    /// Returns the number of month records removed.
    pub(crate) fn delete_template(&mut self, id: TemplateId, confirmed: bool) -> Result<usize> {
        if self.template(id).is_none() {
            return Err(BudgetError::NotFound(format!("template {id}")));
        }
        if !confirmed {
            return Err(BudgetError::ConfirmationRequired(format!(
                "deleting template {id} removes its expense from every month"
            )));
        }
        self.templates.retain(|t| t.id != id);

        let mut removed = 0;
        let changed: BTreeMap<MonthKey, MonthLedgerEntry> = self
            .months
            .iter()
            .filter(|(_, entry)| entry.expenses.iter().any(|e| e.is_derived_from(id)))
            .map(|(month, entry)| {
                let mut next = entry.clone();
                let before = next.expenses.len();
                next.expenses.retain(|e| !e.is_derived_from(id));
                removed += before - next.expenses.len();
                (*month, next)
            })
            .collect();
        let months = changed.len();

        let path = paths::templates(&self.root);
        let deleted = written(
            self.store.delete_collection_item(&path, &id.to_string()),
            "template removal",
        );
        let committed = self.commit(changed);
        let propagated = self.propagate_templates();
        deleted?;
        committed?;
        propagated?;
        info!(template = %id, records = removed, months, "template deleted");
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
