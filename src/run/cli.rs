use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;

use super::{flag_value, has_flag, positionals, shellexpand};
use crate::allocation::{by_priority, compute_allocation, top_expenses, totals_by_category};
use crate::calendar::upcoming_payments;
use crate::error::BudgetError;
use crate::identity::IdentityProvider;
use crate::ledger::{EditScope, LedgerStore};
use crate::models::{parse_amount, ExpenseCategory, ExpenseFields, MonthKey, PaymentDay, Priority};
use crate::report::{export_plan_csv, format_amount, truncate};
use crate::store::DocumentStore;

/// Run one command against `store`, handing the store back when done.
pub(crate) fn as_cli<S: DocumentStore>(
    args: &[String],
    store: S,
    identity: &mut dyn IdentityProvider,
) -> Result<S> {
    let command = args.get(1).map(String::as_str).unwrap_or("summary");
    let rest = args.get(2..).unwrap_or(&[]);
    match command {
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(store)
        }
        "--version" | "-V" | "version" => {
            println!("payday {}", env!("CARGO_PKG_VERSION"));
            Ok(store)
        }
        "signup" | "login" => cli_sign_in(command, rest, store, identity),
        "logout" => {
            identity.sign_out()?;
            println!("Signed out; using data on this device");
            Ok(store)
        }
        "whoami" => {
            match identity.current_user() {
                Some(user) => println!("{user}"),
                None => println!("Not signed in (local data)"),
            }
            Ok(store)
        }
        _ => {
            let user = identity.current_user();
            let mut ledger = LedgerStore::open(store, user.as_ref(), MonthKey::current())
                .context("Failed to load ledger")?;
            ledger.apply_remote_updates()?;
            let outcome = match command {
                "summary" | "s" => cli_summary(rest, &ledger),
                "month" | "m" => cli_month(rest, &mut ledger),
                "months" => cli_months(&ledger),
                "income" | "i" => cli_income(rest, &mut ledger),
                "expense" | "e" => cli_expense(rest, &mut ledger),
                "templates" | "t" => cli_templates(&ledger),
                "upcoming" | "u" => cli_upcoming(&ledger),
                "export" => cli_export(rest, &ledger),
                other => {
                    print_usage();
                    Err(anyhow::anyhow!("Unknown command: {other}"))
                }
            };
            let store = ledger.close();
            outcome.map(|()| store)
        }
    }
}

fn print_usage() {
    println!("Payday Planner: weekly set-asides for monthly bills");
    println!();
    println!("Usage: payday [command]");
    println!();
    println!("Commands:");
    println!("  summary [YYYY-MM]             Allocation summary (default: active month)");
    println!("  month <YYYY-MM|next|prev>     Change the active month");
    println!("  months                        List months with records");
    println!("  income add <amount>           Record a payday in the active month");
    println!("  income edit <id> <amount>     Change a recorded payday");
    println!("  income rm <id>                Remove a recorded payday");
    println!("  expense add <name> <amount>   Add an expense to the active month");
    println!("    --template                  Make it recurring (copied into new months)");
    println!("    --category <c>              utilities, loans, cards or other");
    println!("    --priority <1-5>            1 is most urgent (default 3)");
    println!("    --day <1-31|none>           Day of month the payment is due");
    println!("  expense edit <id> [fields]    Same flags as add, plus --name and --amount");
    println!("    --scope <month|template>    template rewrites every month (default: month)");
    println!("  expense rm <id>               Remove an expense");
    println!("    --scope <month|template>    template removes it from every month");
    println!("    --yes                       Confirm a template removal");
    println!("  templates                     List recurring expenses");
    println!("  upcoming                      Payment dates in the active month");
    println!("  export [path]                 Export the weekly plan to CSV");
    println!("  signup <name> | login <name>  Keep data under an account");
    println!("  logout | whoami               End or show the session");
    println!("  --help, -h                    Show this help");
    println!("  --version, -V                 Show version");
}

fn parse_month(arg: &str, ledger_month: MonthKey) -> Result<MonthKey> {
    match arg {
        "next" => Ok(ledger_month.next()),
        "prev" | "previous" => Ok(ledger_month.prev()),
        "now" | "current" => Ok(MonthKey::current()),
        other => other
            .parse()
            .with_context(|| format!("Invalid month '{other}' (expected YYYY-MM)")),
    }
}

fn cli_sign_in<S: DocumentStore>(
    command: &str,
    args: &[String],
    store: S,
    identity: &mut dyn IdentityProvider,
) -> Result<S> {
    let Some(name) = args.first() else {
        anyhow::bail!("Usage: payday {command} <name>");
    };
    let user = if command == "signup" {
        identity.sign_up(name)?
    } else {
        identity.sign_in(name)?
    };
    let ledger = LedgerStore::open(store, Some(&user), MonthKey::current())
        .context("Failed to load account data")?;
    println!(
        "Signed in as {user} ({} months, {} templates)",
        ledger.list_available_months().len(),
        ledger.templates().len()
    );
    Ok(ledger.close())
}

fn cli_summary<S: DocumentStore>(args: &[String], ledger: &LedgerStore<S>) -> Result<()> {
    let month = match positionals(args).first() {
        Some(arg) => parse_month(arg, ledger.current_month())?,
        None => ledger.current_month(),
    };
    let entry = ledger.get_ledger(month);
    let result = compute_allocation(&entry, month);
    let progress = result.weeks_progress();

    let marker = if month == ledger.current_month() { " (active)" } else { "" };
    println!("Payday Planner: {month}{marker}");
    println!("{}", "─".repeat(48));
    println!("  Status:            {}", result.status);
    println!(
        "  Income:            {}  ({} of {} paydays, {}%)",
        format_amount(result.total_monthly_income),
        progress.recorded,
        progress.expected,
        progress.percent
    );
    println!("  Average weekly:    {}", format_amount(result.average_weekly_salary));
    println!("  Expenses:          {}", format_amount(result.total_monthly_expenses));
    println!("  Weekly set-aside:  {}", format_amount(result.total_weekly_needed));
    println!("  Weekly balance:    {}", format_amount(result.weekly_balance));
    println!("  Monthly balance:   {}", format_amount(result.monthly_balance));

    if !entry.weeks.is_empty() {
        println!();
        println!("Paydays:");
        for week in &entry.weeks {
            println!(
                "  {:<14} {}  {:>12}",
                week.id,
                week.recorded_at.format("%Y-%m-%d"),
                format_amount(week.amount)
            );
        }
    }

    if !entry.expenses.is_empty() {
        println!();
        println!("Weekly plan:");
        println!(
            "  {:<30} {:<20} {:<10} {:>3} {:>12} {:>10}",
            "ID", "Expense", "Category", "Pri", "Monthly", "Weekly"
        );
        for expense in by_priority(&entry.expenses) {
            let weekly = result.share_for(&expense.id).unwrap_or_default();
            let recurring = if expense.template_id().is_some() { "↻ " } else { "" };
            println!(
                "  {:<30} {:<20} {:<10} {:>3} {:>12} {:>10}",
                expense.id,
                truncate(&format!("{recurring}{}", expense.name), 20),
                expense.category,
                expense.priority.get(),
                format_amount(expense.amount),
                format_amount(weekly)
            );
        }

        println!();
        println!("By category:");
        for (category, total) in totals_by_category(&entry.expenses) {
            println!("  {:<12} {:>12}", category.as_str(), format_amount(total));
        }

        println!();
        println!("Largest expenses:");
        for (rank, expense) in top_expenses(&entry.expenses, 3).iter().enumerate() {
            println!("  {}. {:<24} {:>12}", rank + 1, expense.name, format_amount(expense.amount));
        }
    }

    if progress.missing > 0 && month == ledger.current_month() {
        println!();
        println!("{} payday(s) not recorded yet", progress.missing);
    }
    Ok(())
}

fn cli_month<S: DocumentStore>(args: &[String], ledger: &mut LedgerStore<S>) -> Result<()> {
    let Some(arg) = positionals(args).first().copied() else {
        println!("{}", ledger.current_month());
        return Ok(());
    };
    let month = parse_month(arg, ledger.current_month())?;
    let propagated = ledger.switch_month(month)?;
    println!("Active month: {month}");
    if propagated {
        println!(
            "Copied {} recurring expense(s) into {month}",
            ledger.templates().len()
        );
    }
    Ok(())
}

fn cli_months<S: DocumentStore>(ledger: &LedgerStore<S>) -> Result<()> {
    let months = ledger.list_available_months();
    if months.is_empty() {
        println!("No months recorded");
        return Ok(());
    }
    println!("{:<10} {:>6} {:>9} {:>12}", "Month", "Weeks", "Expenses", "Balance");
    println!("{}", "─".repeat(40));
    for month in months {
        let entry = ledger.get_ledger(month);
        let result = compute_allocation(&entry, month);
        let marker = if month == ledger.current_month() { "*" } else { " " };
        println!(
            "{month}{marker}   {:>6} {:>9} {:>12}",
            entry.weeks.len(),
            entry.expenses.len(),
            format_amount(result.monthly_balance)
        );
    }
    Ok(())
}

fn cli_income<S: DocumentStore>(args: &[String], ledger: &mut LedgerStore<S>) -> Result<()> {
    let positional = positionals(args);
    let month = ledger.current_month();
    match positional.as_slice() {
        ["add", amount] => {
            let id = ledger.add_income(parse_amount(amount)?)?;
            println!("Recorded payday {id} in {month}");
        }
        ["edit", id, amount] => {
            let id: u64 = id.parse().with_context(|| format!("Invalid income id: {id}"))?;
            ledger.edit_income(id, parse_amount(amount)?)?;
            println!("Updated payday {id}");
        }
        ["rm", id] => {
            let id: u64 = id.parse().with_context(|| format!("Invalid income id: {id}"))?;
            ledger.delete_income(id)?;
            println!("Removed payday {id}");
        }
        _ => anyhow::bail!("Usage: payday income add <amount> | edit <id> <amount> | rm <id>"),
    }
    Ok(())
}

/// Overwrite `fields` with whatever field flags were given.
fn apply_field_flags(args: &[String], fields: &mut ExpenseFields) -> Result<()> {
    if let Some(name) = flag_value(args, "--name") {
        fields.name = name.to_string();
    }
    if let Some(amount) = flag_value(args, "--amount") {
        fields.amount = parse_amount(amount)?;
    }
    if let Some(category) = flag_value(args, "--category") {
        fields.category = ExpenseCategory::parse(category).ok_or_else(|| {
            anyhow::anyhow!("Unknown category '{category}' (utilities, loans, cards, other)")
        })?;
    }
    if let Some(priority) = flag_value(args, "--priority") {
        let value: u8 = priority
            .parse()
            .with_context(|| format!("Invalid priority: {priority}"))?;
        fields.priority = Priority::new(value)?;
    }
    if let Some(day) = flag_value(args, "--day") {
        fields.payment_day = if day == "none" {
            None
        } else {
            let value: u8 = day.parse().with_context(|| format!("Invalid day: {day}"))?;
            Some(PaymentDay::new(value)?)
        };
    }
    Ok(())
}

fn edit_scope(args: &[String]) -> Result<EditScope> {
    Ok(flag_value(args, "--scope")
        .map(str::parse::<EditScope>)
        .transpose()?
        .unwrap_or(EditScope::Month))
}

fn cli_expense<S: DocumentStore>(args: &[String], ledger: &mut LedgerStore<S>) -> Result<()> {
    let positional = positionals(args);
    match positional.as_slice() {
        ["add", name, amount] => {
            let mut fields = ExpenseFields::new(*name, parse_amount(amount)?);
            apply_field_flags(args, &mut fields)?;
            if has_flag(args, "--template") {
                let (template_id, record_id) = ledger.add_template_expense(fields)?;
                println!("Added recurring expense {template_id} (this month: {record_id})");
            } else {
                let id = ledger.add_month_expense(fields)?;
                println!("Added expense {id} to {}", ledger.current_month());
            }
        }
        ["edit", id] => {
            let scope = edit_scope(args)?;
            let mut fields = match scope {
                EditScope::Month => ledger
                    .current_ledger()
                    .expense(id)
                    .map(|e| e.fields())
                    .ok_or_else(|| BudgetError::NotFound(format!("expense {id}")))?,
                EditScope::Template => {
                    let template_id = ledger.resolve_template(id)?;
                    ledger
                        .template(template_id)
                        .map(|t| t.fields())
                        .ok_or_else(|| BudgetError::NotFound(format!("template {template_id}")))?
                }
            };
            apply_field_flags(args, &mut fields)?;
            let changed = ledger.edit_expense(id, fields, scope)?;
            println!("Updated {changed} record(s)");
        }
        ["rm", id] => {
            let scope = edit_scope(args)?;
            match ledger.delete_expense(id, scope, has_flag(args, "--yes")) {
                Ok(removed) => println!("Removed {removed} record(s)"),
                Err(BudgetError::ConfirmationRequired(reason)) => {
                    anyhow::bail!("{reason}; re-run with --yes to confirm")
                }
                Err(e) => return Err(e.into()),
            }
        }
        _ => anyhow::bail!(
            "Usage: payday expense add <name> <amount> [flags] | edit <id> [flags] | rm <id> [--scope template --yes]"
        ),
    }
    Ok(())
}

fn cli_templates<S: DocumentStore>(ledger: &LedgerStore<S>) -> Result<()> {
    let templates = ledger.templates();
    if templates.is_empty() {
        println!("No recurring expenses");
        return Ok(());
    }
    println!(
        "{:<14} {:<24} {:<10} {:>3} {:>4} {:>12}",
        "ID", "Name", "Category", "Pri", "Day", "Amount"
    );
    println!("{}", "─".repeat(72));
    for template in templates {
        println!(
            "{:<14} {:<24} {:<10} {:>3} {:>4} {:>12}",
            template.id,
            truncate(&template.name, 24),
            template.category,
            template.priority.get(),
            template
                .payment_day
                .map(|d| d.get().to_string())
                .unwrap_or_else(|| "-".into()),
            format_amount(template.amount)
        );
    }
    Ok(())
}

fn cli_upcoming<S: DocumentStore>(ledger: &LedgerStore<S>) -> Result<()> {
    let month = ledger.current_month();
    let entry = ledger.current_ledger();
    let payments = upcoming_payments(&entry.expenses, month, Local::now().date_naive());
    if payments.is_empty() {
        println!("No expenses with a payment day in {month}");
        return Ok(());
    }
    for payment in &payments {
        println!(
            "  {}  {:>4}d  {:<8} {:<24} {:>12}",
            payment.due,
            payment.days_until,
            payment.status,
            truncate(&payment.expense.name, 24),
            format_amount(payment.expense.amount)
        );
    }
    Ok(())
}

fn cli_export<S: DocumentStore>(args: &[String], ledger: &LedgerStore<S>) -> Result<()> {
    let month = ledger.current_month();
    let output_path = positionals(args)
        .first()
        .map(|a| shellexpand(a))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            format!("{home}/payday-plan-{month}.csv")
        });

    let entry = ledger.current_ledger();
    let result = compute_allocation(&entry, month);
    let count = export_plan_csv(Path::new(&output_path), &result, &entry)?;
    if count == 0 {
        println!("No expenses in {month}; wrote totals only to {output_path}");
    } else {
        println!("Exported {count} expenses to {output_path}");
    }
    Ok(())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
