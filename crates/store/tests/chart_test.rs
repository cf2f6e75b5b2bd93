//! Chart of accounts and fiscal calendar maintenance.

mod common;

use common::TestLedger;
use fundbook_core::chart::{AccountType, NewAccount, NormalBalance};
use fundbook_core::fiscal::FiscalPeriodStatus;
use fundbook_core::ledger::ValidationError;
use fundbook_core::{ErrorCategory, LedgerError};
use fundbook_shared::types::AccountId;

#[tokio::test]
async fn test_account_numbers_are_unique() {
    let ledger = TestLedger::new().await;

    let err = ledger
        .core
        .chart
        .create_account(NewAccount::new(" 1000 ", "Petty Cash", AccountType::Asset))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::DuplicateAccountNumber(number)) if number == "1000"
    ));

    let err = ledger
        .core
        .chart
        .create_account(NewAccount::new("  ", "Nameless", AccountType::Asset))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::EmptyAccountNumber)
    ));
}

#[tokio::test]
async fn test_contra_account_keeps_overridden_normal_balance() {
    let ledger = TestLedger::new().await;
    let allowance = ledger
        .core
        .chart
        .create_account(
            NewAccount::new("1290", "Allowance for Doubtful Pledges", AccountType::Asset)
                .with_parent(ledger.accounts.receivable.id)
                .with_normal_balance(NormalBalance::Credit),
        )
        .await
        .unwrap();

    assert_eq!(allowance.normal_balance, NormalBalance::Credit);
    assert_eq!(allowance.parent_id, Some(ledger.accounts.receivable.id));
    assert!(allowance.is_active);

    let err = ledger
        .core
        .chart
        .delete_account(ledger.accounts.receivable.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::AccountHasChildren(_))
    ));
}

#[tokio::test]
async fn test_set_parent_refuses_cycles() {
    let ledger = TestLedger::new().await;
    let chart = &ledger.core.chart;
    let cash = ledger.accounts.cash.id;
    let receivable = ledger.accounts.receivable.id;

    chart.set_parent(receivable, Some(cash)).await.unwrap();

    let err = chart.set_parent(cash, Some(receivable)).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::AccountCycle { .. })
    ));

    let err = chart.set_parent(cash, Some(cash)).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::AccountCycle { .. })
    ));

    let err = chart
        .set_parent(cash, Some(AccountId::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::ParentNotFound(_))
    ));

    let moved = chart.set_parent(receivable, None).await.unwrap();
    assert_eq!(moved.parent_id, None);
}

#[tokio::test]
async fn test_reactivated_account_accepts_entries_again() {
    let ledger = TestLedger::new().await;
    let chart = &ledger.core.chart;
    let revenue = ledger.accounts.revenue.id;

    let inactive = chart.deactivate_account(revenue).await.unwrap();
    assert!(!inactive.is_active);
    let again = chart.deactivate_account(revenue).await.unwrap();
    assert_eq!(again.updated_at, inactive.updated_at);

    chart.reactivate_account(revenue).await.unwrap();
    let posted = ledger.post_revenue(3, rust_decimal_macros::dec!(10)).await;
    assert!(posted.status.is_posted());

    let err = chart.deactivate_account(AccountId::new()).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn test_periods_close_in_order() {
    let ledger = TestLedger::new().await;
    let calendar = &ledger.core.calendar;

    assert_eq!(ledger.periods.len(), 12);
    assert_eq!(ledger.year.end_date, common::date(12, 31));

    let err = calendar
        .close_period(ledger.period(2).id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::EarlierPeriodsOpen(_))
    ));

    calendar.close_period(ledger.period(1).id).await.unwrap();
    let february = calendar.close_period(ledger.period(2).id).await.unwrap();
    assert_eq!(february.status, FiscalPeriodStatus::Closed);

    let periods = calendar.periods(ledger.year.id).await.unwrap();
    let closed = periods
        .iter()
        .filter(|p| p.status == FiscalPeriodStatus::Closed)
        .count();
    assert_eq!(closed, 2);
}
