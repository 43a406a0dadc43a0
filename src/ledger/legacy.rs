//! Decoding of stored documents, including records written before expenses
//! carried an explicit provenance, and the one-off local to account migration.

use chrono::{DateTime, NaiveTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use super::paths;
use crate::allocation::round_money;
use crate::models::{
    ExpenseCategory, ExpenseRecord, IncomeRecord, MonthKey, MonthLedgerEntry, PaymentDay, Priority,
    Provenance, TemplateExpense, TemplateId,
};
use crate::store::{DocumentStore, StoreError};

/// `{templateId}-{YYYY-MM}-{suffix}`; the month segment is missing from the
/// oldest ids, and a bare `{templateId}` has no hyphen at all.
static COMPOSITE_ID: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)(?:-(?:([0-9]{4}-[0-9]{2})(?:-|$))?|$)").ok()
});

fn decimal(value: &Value) -> Option<Decimal> {
    let parsed = match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => Decimal::from_str(s.trim().trim_start_matches('$')).ok(),
        _ => None,
    }?;
    Some(round_money(parsed))
}

fn small_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => n.as_u64().map(|id| id.to_string()),
        _ => None,
    }
}

fn category(value: Option<&Value>) -> ExpenseCategory {
    value
        .and_then(Value::as_str)
        .and_then(ExpenseCategory::parse)
        .unwrap_or(ExpenseCategory::Other)
}

/// Old data stored any integer; out-of-range values are pulled into 1-5.
fn priority(value: Option<&Value>) -> Priority {
    value
        .and_then(small_int)
        .map(|p| p.clamp(1, 5) as u8)
        .and_then(|p| Priority::new(p).ok())
        .unwrap_or_default()
}

fn payment_day(value: Option<&Value>) -> Option<PaymentDay> {
    let day = value.and_then(small_int)?;
    u8::try_from(day).ok().and_then(|d| PaymentDay::new(d).ok())
}

/// Template id named by a legacy expense id, if that template exists.
pub(crate) fn template_of(id: &str, templates: &[TemplateExpense]) -> Option<(TemplateId, Option<MonthKey>)> {
    let captures = COMPOSITE_ID.as_ref()?.captures(id)?;
    let prefix = captures.get(1)?.as_str();
    let template = templates.iter().find(|t| t.id.to_string() == prefix)?;
    let month = captures.get(2).and_then(|m| m.as_str().parse().ok());
    Some((template.id, month))
}

pub(crate) fn decode_income(value: &Value, month: MonthKey) -> Option<IncomeRecord> {
    if let Ok(record) = serde_json::from_value::<IncomeRecord>(value.clone()) {
        return Some(record).filter(|r| r.amount >= Decimal::ZERO);
    }
    let id = value.get("id").and_then(id_string)?.parse().ok()?;
    let amount = value.get("amount").and_then(decimal)?;
    if amount < Decimal::ZERO {
        return None;
    }
    let recorded_at = value
        .get("date")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|| month.first_day().and_time(NaiveTime::MIN).and_utc());
    Some(IncomeRecord {
        id,
        amount,
        recorded_at,
    })
}

/// Decode one stored expense. Records without a provenance are classified by
/// their id: template-derived iff the segment before the first hyphen is the id
/// of an existing template.
pub(crate) fn decode_expense(
    value: &Value,
    month: MonthKey,
    templates: &[TemplateExpense],
) -> Option<ExpenseRecord> {
    if value.get("provenance").is_some() {
        return serde_json::from_value::<ExpenseRecord>(value.clone())
            .ok()
            .filter(|e| e.amount > Decimal::ZERO)
            .map(|mut e| {
                detach_if_orphaned(&mut e, templates);
                e
            });
    }
    let id = value.get("id").and_then(id_string)?;
    let name = value.get("name").and_then(Value::as_str)?.trim().to_string();
    let amount = value.get("amount").and_then(decimal)?;
    if name.is_empty() || amount <= Decimal::ZERO {
        return None;
    }
    let provenance = match template_of(&id, templates) {
        Some((template_id, month_key)) => Provenance::TemplateDerived {
            template_id,
            month_key: month_key.unwrap_or(month),
        },
        None => Provenance::MonthLocal,
    };
    Some(ExpenseRecord {
        id,
        provenance,
        name,
        amount,
        category: category(value.get("category")),
        priority: priority(value.get("priority")),
        payment_day: payment_day(value.get("paymentDay")),
    })
}

/// A record whose template no longer exists becomes month-local.
pub(crate) fn detach_if_orphaned(expense: &mut ExpenseRecord, templates: &[TemplateExpense]) -> bool {
    let Some(template_id) = expense.template_id() else {
        return false;
    };
    if templates.iter().any(|t| t.id == template_id) {
        return false;
    }
    debug!(id = %expense.id, template = %template_id, "template gone; treating expense as month-local");
    expense.provenance = Provenance::MonthLocal;
    true
}

/// Run [`detach_if_orphaned`] over every month. Returns how many records changed.
pub(crate) fn detach_orphans(
    months: &mut BTreeMap<MonthKey, MonthLedgerEntry>,
    templates: &[TemplateExpense],
) -> usize {
    months
        .values_mut()
        .flat_map(|entry| entry.expenses.iter_mut())
        .map(|expense| detach_if_orphaned(expense, templates))
        .filter(|&changed| changed)
        .count()
}

pub(crate) fn decode_entry(value: &Value, month: MonthKey, templates: &[TemplateExpense]) -> MonthLedgerEntry {
    let mut entry = MonthLedgerEntry::default();
    for raw in value.get("weeks").and_then(Value::as_array).into_iter().flatten() {
        match decode_income(raw, month) {
            Some(week) if entry.income(week.id).is_none() => entry.weeks.push(week),
            _ => warn!(%month, record = %raw, "skipping unreadable income record"),
        }
    }
    for raw in value.get("expenses").and_then(Value::as_array).into_iter().flatten() {
        match decode_expense(raw, month, templates) {
            Some(expense) if entry.expense(&expense.id).is_none() => entry.expenses.push(expense),
            _ => warn!(%month, record = %raw, "skipping unreadable expense record"),
        }
    }
    entry.seeded = value.get("seeded").and_then(Value::as_bool).unwrap_or(false)
        || !entry.expenses.is_empty();
    entry
}

pub(crate) fn decode_monthly_data(
    value: &Value,
    templates: &[TemplateExpense],
) -> BTreeMap<MonthKey, MonthLedgerEntry> {
    let mut months = BTreeMap::new();
    let Some(object) = value.as_object() else {
        return months;
    };
    for (key, raw) in object {
        match key.parse::<MonthKey>() {
            Ok(month) if raw.is_object() => {
                months.insert(month, decode_entry(raw, month, templates));
            }
            _ => warn!(key = %key, "skipping malformed month entry"),
        }
    }
    months
}

pub(crate) fn decode_template(key: &str, value: &Value) -> Option<TemplateExpense> {
    if let Ok(template) = serde_json::from_value::<TemplateExpense>(value.clone()) {
        return Some(template).filter(|t| t.amount > Decimal::ZERO);
    }
    let id = value
        .get("id")
        .and_then(id_string)
        .unwrap_or_else(|| key.to_string())
        .parse::<TemplateId>()
        .ok()?;
    let name = value.get("name").and_then(Value::as_str)?.trim().to_string();
    let amount = value.get("amount").and_then(decimal)?;
    if name.is_empty() || amount <= Decimal::ZERO {
        return None;
    }
    Some(TemplateExpense {
        id,
        name,
        amount,
        category: category(value.get("category")),
        priority: priority(value.get("priority")),
        payment_day: payment_day(value.get("paymentDay")),
    })
}

/// Templates ordered by numeric id.
pub(crate) fn decode_templates(items: &[(String, Value)]) -> Vec<TemplateExpense> {
    let mut templates: Vec<TemplateExpense> = items
        .iter()
        .filter_map(|(key, raw)| {
            let decoded = decode_template(key, raw);
            if decoded.is_none() {
                warn!(id = %key, "skipping unreadable template");
            }
            decoded
        })
        .collect();
    templates.sort_by_key(|t| t.id);
    templates.dedup_by_key(|t| t.id);
    templates
}

/// The earliest format kept a single `expenses` list instead of a template
/// collection. Moves it into the collection once, when the collection is empty.
pub(crate) fn import_legacy_templates<S: DocumentStore + ?Sized>(
    store: &mut S,
    root: &str,
) -> Result<usize, StoreError> {
    let legacy_path = paths::legacy_expenses(root);
    let Some(Value::Array(items)) = store.read_doc(&legacy_path)? else {
        return Ok(0);
    };
    let templates_path = paths::templates(root);
    if !store.read_collection(&templates_path)?.is_empty() {
        return Ok(0);
    }
    let mut imported = 0;
    for raw in &items {
        let Some(template) = decode_template("", raw) else {
            warn!(record = %raw, "skipping unreadable legacy expense");
            continue;
        };
        store.write_collection_item(
            &templates_path,
            &template.id.to_string(),
            serde_json::to_value(&template)?,
        )?;
        imported += 1;
    }
    store.write_merge(&legacy_path, Value::Null)?;
    info!(root, imported, "moved legacy expense list into templates");
    Ok(imported)
}

/// Copy data kept under the `local` root into an account the first time the
/// account is opened. Local values win where both sides hold the same month.
/// Returns whether a migration ran.
pub(crate) fn migrate_local_data<S: DocumentStore + ?Sized>(
    store: &mut S,
    user_root: &str,
) -> Result<bool, StoreError> {
    let marker_path = paths::migration(user_root);
    let migrated = store
        .read_doc(&marker_path)?
        .and_then(|m| m.get("migrated").and_then(Value::as_bool))
        .unwrap_or(false);
    if migrated {
        return Ok(false);
    }

    let local = crate::identity::LOCAL_ROOT;
    let mut copied_months = 0;
    if let Some(Value::Object(months)) = store.read_doc(&paths::monthly_data(local))? {
        copied_months = months.len();
        if !months.is_empty() {
            store.write_merge(&paths::monthly_data(user_root), Value::Object(months))?;
        }
    }

    let templates = store.read_collection(&paths::templates(local))?;
    let user_templates = paths::templates(user_root);
    for (id, value) in &templates {
        store.write_collection_item(&user_templates, id, value.clone())?;
    }

    if let Some(Value::Object(settings)) = store.read_doc(&paths::settings(local))? {
        if !settings.is_empty() {
            store.write_merge(&paths::settings(user_root), Value::Object(settings))?;
        }
    }

    let mut marker = Map::new();
    marker.insert("migrated".into(), json!(true));
    marker.insert("date".into(), json!(Utc::now().to_rfc3339()));
    store.write_merge(&marker_path, Value::Object(marker))?;
    info!(
        root = user_root,
        months = copied_months,
        templates = templates.len(),
        "migrated local data into account"
    );
    Ok(true)
}

#[cfg(test)]
#[path = "legacy_tests.rs"]
mod tests;
