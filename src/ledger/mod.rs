//! The monthly ledger: one entry per touched month, the template set, and
//! the active-month pointer. All state is mirrored into a [`DocumentStore`].
//!
//! Mutations apply to the in-memory ledger first and are then written through.
//! A failed write is returned to the caller but the local change is kept.

mod legacy;
mod reconcile;

use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BudgetError, Result};
use crate::identity::{storage_root, UserId};
use crate::models::{
    require_positive, ExpenseRecord, IncomeRecord, MonthKey, MonthLedgerEntry, Provenance,
    TemplateExpense,
};
use crate::store::{DocumentStore, Snapshot, StoreError, SubscriptionId};

pub(crate) use reconcile::EditScope;

/// Document and collection paths under a storage root.
mod paths {
    pub(crate) fn monthly_data(root: &str) -> String {
        format!("{root}/data/monthlyData")
    }

    pub(crate) fn settings(root: &str) -> String {
        format!("{root}/data/settings")
    }

    pub(crate) fn migration(root: &str) -> String {
        format!("{root}/data/migration")
    }

    pub(crate) fn legacy_expenses(root: &str) -> String {
        format!("{root}/data/expenses")
    }

    pub(crate) fn templates(root: &str) -> String {
        format!("{root}/baseExpenses")
    }
}

/// Hands out ids that increase with wall-clock milliseconds and never repeat.
#[derive(Debug, Default)]
pub(crate) struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    pub(crate) fn next_id(&mut self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        self.last = now.max(self.last.saturating_add(1));
        self.last
    }

    pub(crate) fn observe(&mut self, id: u64) {
        self.last = self.last.max(id);
    }
}

/// Log and convert a failed write.
fn written<T>(result: std::result::Result<T, StoreError>, what: &str) -> Result<T> {
    result.map_err(|e| {
        warn!(error = %e, "failed to save {what}; keeping local state");
        BudgetError::Storage(e)
    })
}

pub(crate) struct LedgerStore<S: DocumentStore> {
    store: S,
    root: String,
    months: BTreeMap<MonthKey, MonthLedgerEntry>,
    templates: Vec<TemplateExpense>,
    current: MonthKey,
    ids: IdGenerator,
    inbox: Rc<RefCell<Vec<Snapshot>>>,
    subscriptions: Vec<SubscriptionId>,
}

impl<S: DocumentStore> LedgerStore<S> {
    /// Load the ledger for `user` (or the local root) and run template
    /// propagation for the restored month. `fallback_month` is used when no
    /// active month was saved.
    pub(crate) fn open(mut store: S, user: Option<&UserId>, fallback_month: MonthKey) -> Result<Self> {
        let root = storage_root(user);
        if user.is_some() {
            legacy::migrate_local_data(&mut store, &root)?;
        }
        legacy::import_legacy_templates(&mut store, &root)?;

        let templates = legacy::decode_templates(&store.read_collection(&paths::templates(&root))?);
        let months = store
            .read_doc(&paths::monthly_data(&root))?
            .map(|doc| legacy::decode_monthly_data(&doc, &templates))
            .unwrap_or_default();
        let current = store
            .read_doc(&paths::settings(&root))?
            .and_then(|s| s.get("currentMonthKey").and_then(Value::as_str).map(str::to_string))
            .and_then(|key| key.parse().ok())
            .unwrap_or(fallback_month);

        let mut ids = IdGenerator::default();
        for template in &templates {
            ids.observe(template.id.0);
        }
        for entry in months.values() {
            for week in &entry.weeks {
                ids.observe(week.id);
            }
            for expense in &entry.expenses {
                if let Ok(id) = expense.id.parse() {
                    ids.observe(id);
                }
            }
        }

        let inbox: Rc<RefCell<Vec<Snapshot>>> = Rc::default();
        let subscriptions: Vec<SubscriptionId> = [paths::monthly_data(&root), paths::templates(&root)]
            .iter()
            .map(|path| {
                let sink = Rc::clone(&inbox);
                store.subscribe(
                    path,
                    Box::new(move |snapshot: &Snapshot| {
                        // Snapshots carry full state, so only the newest per path matters.
                        let mut pending = sink.borrow_mut();
                        pending.retain(|s| s.path() != snapshot.path());
                        pending.push(snapshot.clone());
                    }),
                )
            })
            .collect();

        info!(
            root = %root,
            months = months.len(),
            templates = templates.len(),
            current = %current,
            "ledger loaded"
        );
        let mut ledger = Self {
            store,
            root,
            months,
            templates,
            current,
            ids,
            inbox,
            subscriptions,
        };
        ledger.propagate_templates()?;
        Ok(ledger)
    }

    pub(crate) fn current_month(&self) -> MonthKey {
        self.current
    }

    /// Never fails: an unseen month is an empty entry.
    pub(crate) fn get_ledger(&self, month: MonthKey) -> MonthLedgerEntry {
        self.months.get(&month).cloned().unwrap_or_default()
    }

    pub(crate) fn current_ledger(&self) -> MonthLedgerEntry {
        self.get_ledger(self.current)
    }

    /// Apply `update` to a copy of the month's entry and commit the result as
    /// one transition. Nothing changes if `update` fails. Other months are untouched.
    pub(crate) fn try_update_ledger<F>(&mut self, month: MonthKey, update: F) -> Result<()>
    where
        F: FnOnce(&MonthLedgerEntry) -> Result<MonthLedgerEntry>,
    {
        let next = update(&self.get_ledger(month))?;
        self.commit(BTreeMap::from([(month, next)]))
    }

    pub(crate) fn update_ledger<F>(&mut self, month: MonthKey, update: F) -> Result<()>
    where
        F: FnOnce(&MonthLedgerEntry) -> MonthLedgerEntry,
    {
        self.try_update_ledger(month, |entry| Ok(update(entry)))
    }

    /// Install the given entries and write them in a single merge.
    fn commit(&mut self, changed: BTreeMap<MonthKey, MonthLedgerEntry>) -> Result<()> {
        if changed.is_empty() {
            return Ok(());
        }
        let mut patch = Map::new();
        let mut staged = Vec::with_capacity(changed.len());
        for (month, mut entry) in changed {
            entry.seeded |= !entry.expenses.is_empty();
            patch.insert(
                month.to_string(),
                serde_json::to_value(&entry).map_err(StoreError::from)?,
            );
            staged.push((month, entry));
        }
        self.months.extend(staged);
        let path = paths::monthly_data(&self.root);
        written(self.store.write_merge(&path, Value::Object(patch)), "monthly data")
    }

    /// Move the active-month pointer and remember it. No ledger entry is
    /// created or removed.
    pub(crate) fn set_current_month(&mut self, month: MonthKey) -> Result<()> {
        self.current = month;
        let path = paths::settings(&self.root);
        written(
            self.store
                .write_merge(&path, json!({ "currentMonthKey": month.to_string() })),
            "active month",
        )
    }

    /// Change the active month and run template propagation for it.
    /// Returns whether templates were materialized.
    pub(crate) fn switch_month(&mut self, month: MonthKey) -> Result<bool> {
        let saved = self.set_current_month(month);
        let propagated = self.propagate_templates()?;
        saved?;
        Ok(propagated)
    }

    /// Months holding at least one record, most recent first.
    pub(crate) fn list_available_months(&self) -> Vec<MonthKey> {
        self.months
            .iter()
            .rev()
            .filter(|(_, entry)| !entry.is_empty())
            .map(|(month, _)| *month)
            .collect()
    }

    /// Copy every template into the active month if that month has never held
    /// an expense. Safe to call repeatedly.
    pub(crate) fn propagate_templates(&mut self) -> Result<bool> {
        let month = self.current;
        if self.templates.is_empty() {
            return Ok(false);
        }
        if !self
            .months
            .get(&month)
            .map_or(true, MonthLedgerEntry::accepts_templates)
        {
            debug!(%month, "month already seeded; skipping template propagation");
            return Ok(false);
        }
        let templates = self.templates.clone();
        self.update_ledger(month, |entry| {
            let mut next = entry.clone();
            for template in &templates {
                let suffix = unique_suffix(&next);
                next.expenses
                    .push(ExpenseRecord::materialize(template, month, &suffix));
            }
            next
        })?;
        debug!(%month, count = self.templates.len(), "materialized templates");
        Ok(true)
    }

    pub(crate) fn templates(&self) -> &[TemplateExpense] {
        &self.templates
    }

    // ── Income ────────────────────────────────────────────────

    pub(crate) fn add_income(&mut self, amount: Decimal) -> Result<u64> {
        let amount = require_positive(amount)?;
        let id = self.ids.next_id();
        self.update_ledger(self.current, |entry| {
            let mut next = entry.clone();
            next.weeks.push(IncomeRecord::new(id, amount));
            next
        })?;
        Ok(id)
    }

    pub(crate) fn edit_income(&mut self, id: u64, amount: Decimal) -> Result<()> {
        let amount = require_positive(amount)?;
        self.try_update_ledger(self.current, |entry| {
            let mut next = entry.clone();
            let week = next
                .weeks
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or_else(|| BudgetError::NotFound(format!("income record {id}")))?;
            week.amount = amount;
            Ok(next)
        })
    }

    pub(crate) fn delete_income(&mut self, id: u64) -> Result<()> {
        self.try_update_ledger(self.current, |entry| {
            if entry.income(id).is_none() {
                return Err(BudgetError::NotFound(format!("income record {id}")));
            }
            let mut next = entry.clone();
            next.weeks.retain(|w| w.id != id);
            Ok(next)
        })
    }

    // ── Remote updates ────────────────────────────────────────

    /// Apply snapshots pushed by the store since the last call. Incoming state
    /// replaces local state (last write wins). Returns whether anything changed.
    pub(crate) fn apply_remote_updates(&mut self) -> Result<bool> {
        let pending: Vec<Snapshot> = self.inbox.borrow_mut().drain(..).collect();
        if pending.is_empty() {
            return Ok(false);
        }
        let monthly_path = paths::monthly_data(&self.root);
        let templates_path = paths::templates(&self.root);
        let template_count = self.templates.len();
        let mut changed = false;

        // Templates first, so month records decode against the fresh set.
        for snapshot in &pending {
            if let Snapshot::Collection { path, items } = snapshot {
                if *path == templates_path {
                    let templates = legacy::decode_templates(items);
                    for template in &templates {
                        self.ids.observe(template.id.0);
                    }
                    changed |= templates != self.templates;
                    self.templates = templates;
                }
            }
        }
        for snapshot in &pending {
            if let Snapshot::Document { path, value } = snapshot {
                if *path == monthly_path {
                    let months = match value {
                        Some(doc) => legacy::decode_monthly_data(doc, &self.templates),
                        None => {
                            debug!(path = %path, "monthly data removed remotely; clearing months");
                            BTreeMap::new()
                        }
                    };
                    changed |= months != self.months;
                    self.months = months;
                }
            }
        }
        // Copies of templates deleted elsewhere stay behind as month-local records.
        if legacy::detach_orphans(&mut self.months, &self.templates) > 0 {
            changed = true;
        }

        if changed {
            debug!(snapshots = pending.len(), "applied remote updates");
        }
        if self.templates.len() != template_count {
            self.propagate_templates()?;
        }
        Ok(changed)
    }

    /// Stop listening and hand back the store.
    pub(crate) fn close(mut self) -> S {
        for id in self.subscriptions.drain(..) {
            self.store.unsubscribe(id);
        }
        self.store
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

/// Short random suffix not already used by a record in `entry`.
fn unique_suffix(entry: &MonthLedgerEntry) -> String {
    loop {
        let uuid = Uuid::new_v4().simple().to_string();
        let suffix = uuid[..8].to_string();
        let taken = entry.expenses.iter().any(|e| {
            matches!(e.provenance, Provenance::TemplateDerived { .. }) && e.id.ends_with(&suffix)
        });
        if !taken {
            return suffix;
        }
    }
}
