#![allow(clippy::unwrap_used)]

use rust_decimal_macros::dec;
use std::path::{Path, PathBuf};

use super::*;
use crate::identity::LocalIdentity;
use crate::run::{flag_value, positionals};
use crate::store::SqliteStore;

struct Session {
    _dir: tempfile::TempDir,
    db: PathBuf,
    identity: LocalIdentity,
}

impl Session {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("payday.db");
        Self {
            _dir: dir,
            db,
            identity: LocalIdentity::ephemeral(),
        }
    }

    fn run(&mut self, line: &str) -> Result<()> {
        let args: Vec<String> = std::iter::once("payday")
            .chain(line.split_whitespace())
            .map(String::from)
            .collect();
        let store = SqliteStore::open(&self.db)?;
        as_cli(&args, store, &mut self.identity).map(|_| ())
    }

    fn ledger(&self) -> LedgerStore<SqliteStore> {
        let user = self.identity.current_user();
        let fallback: MonthKey = "2000-01".parse().unwrap();
        LedgerStore::open(SqliteStore::open(&self.db).unwrap(), user.as_ref(), fallback).unwrap()
    }

    fn dir(&self) -> &Path {
        self.db.parent().unwrap()
    }
}

// ── Argument helpers ──────────────────────────────────────────

#[test]
fn test_positionals_skip_flag_values() {
    let args: Vec<String> = ["add", "Rent", "--category", "loans", "800", "--template"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(positionals(&args), vec!["add", "Rent", "800"]);
    assert_eq!(flag_value(&args, "--category"), Some("loans"));
    assert_eq!(flag_value(&args, "--priority"), None);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn test_month_and_income() {
    let mut s = Session::new();
    s.run("month 2025-03").unwrap();
    s.run("income add 1000").unwrap();
    s.run("income add 950.50").unwrap();

    let ledger = s.ledger();
    assert_eq!(ledger.current_month().to_string(), "2025-03");
    let entry = ledger.current_ledger();
    assert_eq!(entry.weeks.len(), 2);

    let id = entry.weeks[0].id;
    s.run(&format!("income edit {id} 1200")).unwrap();
    s.run(&format!("income rm {}", entry.weeks[1].id)).unwrap();
    let entry = s.ledger().current_ledger();
    assert_eq!(entry.weeks.len(), 1);
    assert_eq!(entry.weeks[0].amount, dec!(1200));
}

#[test]
fn test_month_next_and_prev() {
    let mut s = Session::new();
    s.run("month 2025-12").unwrap();
    s.run("month next").unwrap();
    assert_eq!(s.ledger().current_month().to_string(), "2026-01");
    s.run("month prev").unwrap();
    s.run("month prev").unwrap();
    assert_eq!(s.ledger().current_month().to_string(), "2025-11");
    assert!(s.run("month 2025-13").is_err());
}

#[test]
fn test_income_rejects_bad_input() {
    let mut s = Session::new();
    s.run("month 2025-03").unwrap();
    assert!(s.run("income add -5").is_err());
    assert!(s.run("income rm abc").is_err());
    assert!(s.run("income rm 42").is_err());
    assert!(s.run("income").is_err());
}

#[test]
fn test_recurring_expense_flows_into_new_months() {
    let mut s = Session::new();
    s.run("month 2025-03").unwrap();
    s.run("expense add Rent 800 --template --category loans --priority 1 --day 5")
        .unwrap();
    s.run("expense add Gym 40").unwrap();
    s.run("month 2025-04").unwrap();

    let ledger = s.ledger();
    assert_eq!(ledger.templates().len(), 1);
    let april = ledger.current_ledger();
    assert_eq!(april.expenses.len(), 1);
    let rent = &april.expenses[0];
    assert_eq!(rent.name, "Rent");
    assert_eq!(rent.category, ExpenseCategory::Loans);
    assert_eq!(rent.priority, Priority::HIGHEST);
    assert_eq!(rent.payment_day.map(|d| d.get()), Some(5));
    assert_eq!(ledger.get_ledger("2025-03".parse().unwrap()).expenses.len(), 2);
}

#[test]
fn test_template_scope_edit_updates_every_month() {
    let mut s = Session::new();
    s.run("month 2025-03").unwrap();
    s.run("expense add Rent 800 --template").unwrap();
    s.run("month 2025-04").unwrap();
    let id = s.ledger().current_ledger().expenses[0].id.clone();

    s.run(&format!("expense edit {id} --scope template --amount 900 --day none"))
        .unwrap();

    let ledger = s.ledger();
    for key in ["2025-03", "2025-04"] {
        let entry = ledger.get_ledger(key.parse().unwrap());
        assert_eq!(entry.expenses[0].amount, dec!(900), "{key}");
        assert_eq!(entry.expenses[0].name, "Rent");
    }
    assert_eq!(ledger.templates()[0].amount, dec!(900));
}

#[test]
fn test_month_scope_edit_leaves_template() {
    let mut s = Session::new();
    s.run("month 2025-03").unwrap();
    s.run("expense add Rent 800 --template").unwrap();
    let id = s.ledger().current_ledger().expenses[0].id.clone();

    s.run(&format!("expense edit {id} --name Lease")).unwrap();

    let ledger = s.ledger();
    assert_eq!(ledger.current_ledger().expenses[0].name, "Lease");
    assert_eq!(ledger.templates()[0].name, "Rent");
}

#[test]
fn test_template_removal_needs_confirmation() {
    let mut s = Session::new();
    s.run("month 2025-03").unwrap();
    s.run("expense add Rent 800 --template").unwrap();
    let id = s.ledger().current_ledger().expenses[0].id.clone();

    let err = s.run(&format!("expense rm {id} --scope template")).unwrap_err();
    assert!(err.to_string().contains("--yes"));
    assert_eq!(s.ledger().templates().len(), 1);

    s.run(&format!("expense rm {id} --scope template --yes")).unwrap();
    let ledger = s.ledger();
    assert!(ledger.templates().is_empty());
    assert!(ledger.current_ledger().expenses.is_empty());
}

#[test]
fn test_expense_rejects_invalid_fields() {
    let mut s = Session::new();
    s.run("month 2025-03").unwrap();
    assert!(s.run("expense add Rent 800 --category rent").is_err());
    assert!(s.run("expense add Rent 800 --priority 9").is_err());
    assert!(s.run("expense add Rent 800 --day 32").is_err());
    assert!(s.run("expense add Rent 0").is_err());
    assert!(s.run("expense edit missing --amount 5").is_err());
    assert!(s.ledger().current_ledger().expenses.is_empty());
}

#[test]
fn test_export_writes_plan() {
    let mut s = Session::new();
    s.run("month 2025-03").unwrap();
    s.run("income add 1000").unwrap();
    s.run("expense add Gym 40").unwrap();
    let path = s.dir().join("plan.csv");

    s.run(&format!("export {}", path.display())).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Expense,Category"));
    assert!(text.contains("Gym"));
}

#[test]
fn test_read_only_commands() {
    let mut s = Session::new();
    s.run("month 2025-03").unwrap();
    s.run("expense add Rent 800 --template --day 5").unwrap();
    s.run("summary").unwrap();
    s.run("summary 2025-02").unwrap();
    s.run("months").unwrap();
    s.run("templates").unwrap();
    s.run("upcoming").unwrap();
    s.run("help").unwrap();
    s.run("version").unwrap();
}

#[test]
fn test_unknown_command_fails() {
    let mut s = Session::new();
    let err = s.run("frobnicate").unwrap_err();
    assert!(err.to_string().contains("frobnicate"));
}

// ── Accounts ──────────────────────────────────────────────────

#[test]
fn test_signup_carries_local_data_into_account() {
    let mut s = Session::new();
    s.run("month 2025-03").unwrap();
    s.run("income add 1000").unwrap();

    s.run("signup alice").unwrap();
    assert_eq!(s.identity.current_user().unwrap().as_str(), "alice");
    let ledger = s.ledger();
    let march = ledger.get_ledger("2025-03".parse().unwrap());
    assert_eq!(march.weeks.len(), 1);

    s.run("income add 500").unwrap();
    s.run("logout").unwrap();
    assert!(s.identity.current_user().is_none());
    let local = s.ledger();
    assert_eq!(local.get_ledger("2025-03".parse().unwrap()).weeks.len(), 1);
}

#[test]
fn test_login_requires_known_user() {
    let mut s = Session::new();
    assert!(s.run("login bob").is_err());
    assert!(s.run("signup").is_err());
    s.run("signup bob").unwrap();
    assert!(s.run("signup bob").is_err());
    s.run("logout").unwrap();
    s.run("login bob").unwrap();
    s.run("whoami").unwrap();
}
