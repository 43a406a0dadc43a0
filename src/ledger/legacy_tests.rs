#![allow(clippy::unwrap_used)]

use rust_decimal_macros::dec;

use super::*;
use crate::ledger::{EditScope, LedgerStore};
use crate::models::ExpenseFields;
use crate::store::MemoryStore;

fn month(s: &str) -> MonthKey {
    s.parse().unwrap()
}

fn template(id: u64) -> TemplateExpense {
    TemplateExpense::new(TemplateId(id), ExpenseFields::new("Rent", dec!(500)))
}

// ── Composite ids ─────────────────────────────────────────────

#[test]
fn test_template_of_requires_existing_template() {
    let templates = vec![template(5), template(50)];
    assert_eq!(
        template_of("5-2025-03-1739000000000", &templates),
        Some((TemplateId(5), Some(month("2025-03"))))
    );
    assert_eq!(
        template_of("50-2025-03-1739000000000-0", &templates),
        Some((TemplateId(50), Some(month("2025-03"))))
    );
    assert_eq!(template_of("5-x", &templates), Some((TemplateId(5), None)));
    assert_eq!(template_of("7-2025-03-1", &templates), None);
    assert_eq!(template_of("05-2025-03-1", &templates), None);
    assert_eq!(template_of("5", &templates), Some((TemplateId(5), None)));
    assert_eq!(
        template_of("5-2025-03", &templates),
        Some((TemplateId(5), Some(month("2025-03"))))
    );
    assert_eq!(template_of("5abc", &templates), None);
    assert_eq!(template_of("1739000000000", &templates), None);
}

// ── Expenses ──────────────────────────────────────────────────

#[test]
fn test_legacy_expense_derived_from_template() {
    let raw = json!({
        "id": "5-2025-02-1738000000000",
        "name": "Renta",
        "amount": 500.0,
        "category": "préstamos",
        "priority": 1,
        "paymentDay": 5
    });
    let record = decode_expense(&raw, month("2025-03"), &[template(5)]).unwrap();
    assert_eq!(
        record.provenance,
        Provenance::TemplateDerived {
            template_id: TemplateId(5),
            month_key: month("2025-02"),
        }
    );
    assert_eq!(record.amount, dec!(500));
    assert_eq!(record.category, ExpenseCategory::Loans);
    assert_eq!(record.payment_day, Some(PaymentDay::new(5).unwrap()));
}

#[test]
fn test_legacy_expense_without_matching_template_is_local() {
    let raw = json!({"id": 1738000000000u64, "name": "Luz", "amount": 45.5, "category": "servicios"});
    let record = decode_expense(&raw, month("2025-03"), &[template(5)]).unwrap();
    assert_eq!(record.id, "1738000000000");
    assert_eq!(record.provenance, Provenance::MonthLocal);
    assert_eq!(record.amount, dec!(45.5));
    assert_eq!(record.category, ExpenseCategory::Utilities);
    assert_eq!(record.priority, Priority::default());
    assert_eq!(record.payment_day, None);

    // The template was deleted: its old copies no longer count as derived.
    let raw = json!({"id": "9-2025-03-1", "name": "Old", "amount": 10});
    let record = decode_expense(&raw, month("2025-03"), &[template(5)]).unwrap();
    assert_eq!(record.provenance, Provenance::MonthLocal);
}

#[test]
fn test_legacy_expense_fields_normalized() {
    let raw = json!({
        "id": "1",
        "name": "  Tarjeta ",
        "amount": 33.333,
        "category": "desconocida",
        "priority": 9,
        "paymentDay": 40
    });
    let record = decode_expense(&raw, month("2025-03"), &[]).unwrap();
    assert_eq!(record.name, "Tarjeta");
    assert_eq!(record.amount, dec!(33.33));
    assert_eq!(record.category, ExpenseCategory::Other);
    assert_eq!(record.priority, Priority::LOWEST);
    assert_eq!(record.payment_day, None);

    let raw = json!({"id": "2", "name": "x", "amount": "12.50", "priority": 0, "paymentDay": "31"});
    let record = decode_expense(&raw, month("2025-03"), &[]).unwrap();
    assert_eq!(record.amount, dec!(12.50));
    assert_eq!(record.priority, Priority::HIGHEST);
    assert_eq!(record.payment_day, Some(PaymentDay::new(31).unwrap()));
}

#[test]
fn test_unreadable_expenses_rejected() {
    let month = month("2025-03");
    assert!(decode_expense(&json!({"name": "x", "amount": 1}), month, &[]).is_none());
    assert!(decode_expense(&json!({"id": "1", "amount": 1}), month, &[]).is_none());
    assert!(decode_expense(&json!({"id": "1", "name": "x", "amount": 0}), month, &[]).is_none());
    assert!(decode_expense(&json!({"id": "1", "name": "x", "amount": "abc"}), month, &[]).is_none());
    assert!(decode_expense(&json!({"id": "1", "name": " ", "amount": 3}), month, &[]).is_none());
}

#[test]
fn test_current_format_expense_decodes() {
    let record = ExpenseRecord::materialize(&template(5), month("2025-03"), "abcd1234");
    let raw = serde_json::to_value(&record).unwrap();
    assert_eq!(decode_expense(&raw, month("2025-03"), &[template(5)]), Some(record.clone()));

    // Stored provenance pointing at a template that no longer exists.
    let orphan = decode_expense(&raw, month("2025-03"), &[template(50)]).unwrap();
    assert_eq!(orphan.provenance, Provenance::MonthLocal);
    assert_eq!(orphan.id, record.id);
    assert_eq!(orphan.amount, record.amount);
}

#[test]
fn test_bare_template_id_is_derived() {
    let raw = json!({"id": "5", "name": "Rent", "amount": 500, "category": "loans"});
    let record = decode_expense(&raw, month("2025-03"), &[template(5)]).unwrap();
    assert_eq!(record.template_id(), Some(TemplateId(5)));
    assert_eq!(
        record.provenance,
        Provenance::TemplateDerived {
            template_id: TemplateId(5),
            month_key: month("2025-03"),
        }
    );
}

#[test]
fn test_detach_orphans_across_months() {
    let mut months = BTreeMap::new();
    for key in ["2025-03", "2025-04"] {
        let mut entry = MonthLedgerEntry::default();
        entry
            .expenses
            .push(ExpenseRecord::materialize(&template(5), month(key), "s"));
        entry
            .expenses
            .push(ExpenseRecord::materialize(&template(7), month(key), "t"));
        months.insert(month(key), entry);
    }
    assert_eq!(detach_orphans(&mut months, &[template(7)]), 2);
    for entry in months.values() {
        assert_eq!(entry.expenses[0].provenance, Provenance::MonthLocal);
        assert_eq!(entry.expenses[1].template_id(), Some(TemplateId(7)));
    }
    assert_eq!(detach_orphans(&mut months, &[template(7)]), 0);
}

// ── Entries ───────────────────────────────────────────────────

#[test]
fn test_decode_entry_skips_bad_and_duplicate_records() {
    let raw = json!({
        "weeks": [
            {"id": 1, "amount": 1000, "date": "2025-03-07T18:00:00.000Z"},
            {"id": 1, "amount": 5},
            {"id": 2, "amount": -3},
            {"id": 3, "amount": 900.5}
        ],
        "expenses": [
            {"id": "10", "name": "Agua", "amount": 20},
            {"id": "10", "name": "Agua", "amount": 20},
            {"id": "11", "name": "", "amount": 20}
        ]
    });
    let entry = decode_entry(&raw, month("2025-03"), &[]);
    assert_eq!(entry.weeks.len(), 2);
    assert_eq!(entry.weeks[0].amount, dec!(1000));
    assert_eq!(entry.weeks[1].amount, dec!(900.5));
    assert_eq!(
        entry.weeks[1].recorded_at,
        month("2025-03").first_day().and_time(NaiveTime::MIN).and_utc()
    );
    assert_eq!(entry.expenses.len(), 1);
    assert!(entry.seeded);
}

#[test]
fn test_decode_entry_seeded_flag() {
    let empty = decode_entry(&json!({}), month("2025-03"), &[]);
    assert!(!empty.seeded);
    assert!(empty.is_empty());
    let emptied = decode_entry(&json!({"expenses": [], "seeded": true}), month("2025-03"), &[]);
    assert!(emptied.seeded);
}

#[test]
fn test_decode_monthly_data_skips_malformed_keys() {
    let raw = json!({
        "2025-03": {"weeks": [{"id": 1, "amount": 10}]},
        "2025-3": {"weeks": []},
        "march": {},
        "2025-04": []
    });
    let months = decode_monthly_data(&raw, &[]);
    assert_eq!(months.keys().copied().collect::<Vec<_>>(), vec![month("2025-03")]);
    assert!(decode_monthly_data(&json!([1, 2]), &[]).is_empty());
}

// ── Templates ─────────────────────────────────────────────────

#[test]
fn test_decode_legacy_template() {
    let raw = json!({"name": "Internet", "amount": 59.99, "category": "servicios", "priority": 2});
    let template = decode_template("1738000000000", &raw).unwrap();
    assert_eq!(template.id, TemplateId(1738000000000));
    assert_eq!(template.amount, dec!(59.99));
    assert_eq!(template.category, ExpenseCategory::Utilities);
    assert!(decode_template("not-a-number", &raw).is_none());
    assert!(decode_template("1", &json!({"name": "x", "amount": -1})).is_none());
}

#[test]
fn test_decode_templates_sorted_numerically() {
    let items = vec![
        ("10".to_string(), json!({"id": 10, "name": "B", "amount": 1})),
        ("9".to_string(), json!({"id": 9, "name": "A", "amount": 1})),
        ("bad".to_string(), json!({"name": "C"})),
    ];
    let ids: Vec<TemplateId> = decode_templates(&items).iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![TemplateId(9), TemplateId(10)]);
}

#[test]
fn test_legacy_expense_list_becomes_templates() {
    let mut store = MemoryStore::new();
    store
        .write_merge(
            "local/data/expenses",
            json!([
                {"id": 5, "name": "Renta", "amount": 500, "category": "préstamos"},
                {"id": 6, "name": "Luz", "amount": 40.5, "category": "servicios"},
                {"name": "sin id", "amount": 1}
            ]),
        )
        .unwrap();
    assert_eq!(import_legacy_templates(&mut store, "local").unwrap(), 2);
    assert_eq!(store.read_collection("local/baseExpenses").unwrap().len(), 2);
    assert_eq!(store.read_doc("local/data/expenses").unwrap(), Some(Value::Null));
    assert_eq!(import_legacy_templates(&mut store, "local").unwrap(), 0);
}

#[test]
fn test_legacy_list_ignored_when_templates_exist() {
    let mut store = MemoryStore::new();
    store
        .write_collection_item("local/baseExpenses", "1", json!({"id": 1, "name": "A", "amount": 1}))
        .unwrap();
    store
        .write_merge("local/data/expenses", json!([{"id": 5, "name": "B", "amount": 2}]))
        .unwrap();
    assert_eq!(import_legacy_templates(&mut store, "local").unwrap(), 0);
    assert_eq!(store.read_collection("local/baseExpenses").unwrap().len(), 1);
}

// ── Migration ─────────────────────────────────────────────────

#[test]
fn test_migration_copies_local_data_and_marks_done() {
    let mut store = MemoryStore::new();
    store
        .write_merge("local/data/monthlyData", json!({"2025-03": {"weeks": [{"id": 1, "amount": 10}]}}))
        .unwrap();
    store
        .write_merge("local/data/settings", json!({"currentMonthKey": "2025-03"}))
        .unwrap();
    store
        .write_collection_item("local/baseExpenses", "5", json!({"id": 5, "name": "Rent", "amount": 500}))
        .unwrap();
    store
        .write_merge("users/ana/data/monthlyData", json!({"2025-01": {"weeks": []}}))
        .unwrap();

    assert!(migrate_local_data(&mut store, "users/ana").unwrap());
    let months = store.read_doc("users/ana/data/monthlyData").unwrap().unwrap();
    assert!(months.get("2025-01").is_some());
    assert!(months.get("2025-03").is_some());
    assert_eq!(store.read_collection("users/ana/baseExpenses").unwrap().len(), 1);
    let settings = store.read_doc("users/ana/data/settings").unwrap().unwrap();
    assert_eq!(settings["currentMonthKey"], "2025-03");
    let marker = store.read_doc("users/ana/data/migration").unwrap().unwrap();
    assert_eq!(marker["migrated"], true);
    assert!(marker["date"].is_string());

    assert!(!migrate_local_data(&mut store, "users/ana").unwrap());
}

#[test]
fn test_migration_with_nothing_local_still_marks_done() {
    let mut store = MemoryStore::new();
    assert!(migrate_local_data(&mut store, "users/ana").unwrap());
    assert!(store.read_doc("users/ana/data/monthlyData").unwrap().is_none());
    assert!(store.read_doc("users/ana/data/migration").unwrap().is_some());
}

// ── End to end ────────────────────────────────────────────────

#[test]
fn test_ledger_opens_legacy_data_and_cascades() {
    let mut store = MemoryStore::new();
    store
        .write_merge(
            "local/data/expenses",
            json!([{"id": 5, "name": "Renta", "amount": 500, "category": "préstamos", "priority": 1}]),
        )
        .unwrap();
    store
        .write_merge(
            "local/data/monthlyData",
            json!({
                "2025-02": {
                    "weeks": [{"id": 100, "amount": 1000, "date": "2025-02-07T18:00:00.000Z"}],
                    "expenses": [
                        {"id": "5-2025-02-1738000000000", "name": "Renta", "amount": 500, "category": "préstamos", "priority": 1},
                        {"id": 1738000000001u64, "name": "Médico", "amount": 80, "category": "otros"}
                    ]
                }
            }),
        )
        .unwrap();
    store
        .write_merge("local/data/settings", json!({"currentMonthKey": "2025-02"}))
        .unwrap();

    let mut ledger = LedgerStore::open(store, None, month("2025-06")).unwrap();
    assert_eq!(ledger.current_month(), month("2025-02"));
    assert_eq!(ledger.templates().len(), 1);
    let february = ledger.current_ledger();
    assert_eq!(february.expenses.len(), 2);
    assert!(february.expenses[0].is_derived_from(TemplateId(5)));
    assert_eq!(february.expenses[1].template_id(), None);

    let removed = ledger
        .delete_expense("5-2025-02-1738000000000", EditScope::Template, true)
        .unwrap();
    assert_eq!(removed, 1);
    let february = ledger.current_ledger();
    assert_eq!(february.expenses.len(), 1);
    assert_eq!(february.expenses[0].name, "Médico");
}
