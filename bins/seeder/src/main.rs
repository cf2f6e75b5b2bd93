//! Demo seeder for Fundbook.
//!
//! Builds a small nonprofit ledger in memory for the current calendar year,
//! walks it through posting, payment and budget revision, then prints the
//! trial balance, receivables aging and budget variance as JSON.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::info;

use fundbook_core::LedgerCore;
use fundbook_core::budget::{BudgetChange, NewBudget, NewBudgetItem, PeriodSelector, PeriodType};
use fundbook_core::chart::{AccountType, NewAccount};
use fundbook_core::clock::{Clock, SystemClock};
use fundbook_core::ledger::{EntryInput, NewTransaction};
use fundbook_shared::telemetry::init_tracing;
use fundbook_shared::types::{CustomerId, FundId, UserId};
use fundbook_shared::AppConfig;
use fundbook_store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging).context("failed to install tracing subscriber")?;

    let clock = Arc::new(SystemClock);
    let today = clock.today();
    let core = LedgerCore::new(Arc::new(MemoryStore::new()), clock, &config.ledger);
    let user = UserId::new();

    let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1)
        .context("current year has no 1 January")?;
    let (year, periods) = core
        .calendar
        .create_year(format!("FY {}", today.year()), year_start)
        .await?;
    let period = periods
        .iter()
        .find(|p| p.contains_date(today))
        .context("today falls outside the seeded fiscal year")?;
    info!(fiscal_year = %year.name, period = period.period_number, "Seeding fiscal year");

    let cash = core
        .chart
        .create_account(NewAccount::new("1000", "Operating Cash", AccountType::Asset))
        .await?;
    let receivable = core
        .chart
        .create_account(NewAccount::new("1200", "Grants Receivable", AccountType::Asset))
        .await?;
    let revenue = core
        .chart
        .create_account(NewAccount::new("4000", "Contributions", AccountType::Revenue))
        .await?;
    let programs = core
        .chart
        .create_account(NewAccount::new("5000", "Program Services", AccountType::Expense))
        .await?;

    let scholarship_fund = FundId::new();
    let donation = NewTransaction::journal_entry(
        period.id,
        today,
        "Restricted scholarship gift",
        vec![
            EntryInput::debit(cash.id, dec!(25000)).with_fund(scholarship_fund),
            EntryInput::credit(revenue.id, dec!(25000)).with_fund(scholarship_fund),
        ],
        user,
    );
    let spending = NewTransaction::journal_entry(
        period.id,
        today,
        "Scholarship disbursements",
        vec![
            EntryInput::debit(programs.id, dec!(4250.50)).with_fund(scholarship_fund),
            EntryInput::credit(cash.id, dec!(4250.50)).with_fund(scholarship_fund),
        ],
        user,
    );
    let pledge = NewTransaction::invoice(
        period.id,
        today,
        CustomerId::new(),
        today - Duration::days(45),
        vec![
            EntryInput::debit(receivable.id, dec!(12000)),
            EntryInput::credit(revenue.id, dec!(12000)),
        ],
        user,
    )
    .with_description("Foundation pledge");

    let mut pledge_id = None;
    for input in [donation, spending, pledge] {
        let draft = core.transactions.create_draft(input).await?;
        core.transactions.submit_for_approval(draft.id, user).await?;
        core.transactions.approve(draft.id, user).await?;
        let posted = core.transactions.post(draft.id, user).await?;
        if posted.settlement.is_some() {
            pledge_id = Some(posted.id);
        }
    }
    if let Some(id) = pledge_id {
        core.transactions
            .record_payment(id, dec!(5000), today, user)
            .await?;
    }

    let budget = core
        .budgets
        .create_budget(NewBudget {
            name: "Scholarship program".to_string(),
            fiscal_year_id: year.id,
            fund_id: Some(scholarship_fund),
            period_type: PeriodType::Quarterly,
            items: vec![NewBudgetItem {
                account_id: programs.id,
                amount: dec!(18000),
                distribution: None,
                notes: None,
            }],
            created_by: user,
        })
        .await?;
    core.revisions
        .apply_revision(
            budget.id,
            vec![BudgetChange::Add {
                account_id: revenue.id,
                amount: dec!(20000),
                distribution: None,
                notes: Some("Expected restricted gifts".to_string()),
            }],
            user,
            Some("Add revenue target".to_string()),
        )
        .await?;

    let trial_balance = core.balances.trial_balance(period.id).await?;
    let aging = core.aging.compute_aging(None, today).await?;
    let variance = core
        .variance
        .compute_variance(budget.id, PeriodSelector::YearToDate)
        .await?;
    info!(
        balanced = trial_balance.is_balanced(),
        receivables = %aging.total,
        "Seeding complete"
    );

    let summary = json!({
        "fiscal_year": year,
        "trial_balance": trial_balance,
        "aging": aging,
        "variance": variance,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
