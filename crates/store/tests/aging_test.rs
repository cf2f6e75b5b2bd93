//! Invoice payments and receivables aging.

mod common;

use chrono::Duration;
use rust_decimal_macros::dec;

use common::{TestLedger, date};
use fundbook_core::ledger::{EntryInput, NewTransaction, ValidationError};
use fundbook_core::reports::AgingBucket;
use fundbook_core::workflow::TransactionStatus;
use fundbook_core::{ErrorCategory, LedgerError};
use fundbook_shared::types::CustomerId;

#[tokio::test]
async fn test_invoice_45_days_overdue_lands_in_31_60() {
    let ledger = TestLedger::new().await;
    let as_of = date(3, 15);
    let customer = CustomerId::new();
    let invoice = ledger
        .posted_invoice(customer, dec!(1000), as_of - Duration::days(45))
        .await;

    let report = ledger.core.aging.compute_aging(None, as_of).await.unwrap();
    assert_eq!(report.customers.len(), 1);
    assert_eq!(report.total, dec!(1000));
    assert_eq!(report.buckets.days_31_60, dec!(1000));
    assert_eq!(report.buckets.get(AgingBucket::Current), dec!(0));

    let line = &report.customers[0].invoices[0];
    assert_eq!(line.transaction_id, invoice.id);
    assert_eq!(line.days_overdue, 45);
    assert_eq!(line.bucket, AgingBucket::Days31To60);
    assert_eq!(line.bucket.label(), "31-60");
}

#[tokio::test]
async fn test_payments_move_invoice_to_paid() {
    let ledger = TestLedger::new().await;
    let customer = CustomerId::new();
    let invoice = ledger
        .posted_invoice(customer, dec!(1000), date(2, 9))
        .await;
    let workflow = &ledger.core.transactions;

    let partial = workflow
        .record_payment(invoice.id, dec!(400), date(3, 1), ledger.user)
        .await
        .unwrap();
    assert_eq!(partial.status, TransactionStatus::PartiallyPaid);
    assert_eq!(partial.outstanding(), Some(dec!(600)));

    let report = ledger
        .core
        .aging
        .compute_aging(Some(customer), date(3, 15))
        .await
        .unwrap();
    assert_eq!(report.total, dec!(600));
    assert_eq!(report.customers[0].invoices[0].amount_paid, dec!(400));
    assert_eq!(report.buckets.days_31_60, dec!(600));

    let paid = workflow
        .record_payment(invoice.id, dec!(600), date(3, 14), ledger.user)
        .await
        .unwrap();
    assert_eq!(paid.status, TransactionStatus::Paid);
    assert_eq!(paid.settlement.as_ref().map(|s| s.payments.len()), Some(2));

    let report = ledger
        .core
        .aging
        .compute_aging(None, date(3, 15))
        .await
        .unwrap();
    assert!(report.customers.is_empty());
    assert_eq!(report.total, dec!(0));

    let err = workflow
        .void(invoice.id, "customer dispute", ledger.user)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InvalidState);
}

#[tokio::test]
async fn test_overpayment_is_rejected() {
    let ledger = TestLedger::new().await;
    let invoice = ledger
        .posted_invoice(CustomerId::new(), dec!(1000), date(4, 1))
        .await;

    let err = ledger
        .core
        .transactions
        .record_payment(invoice.id, dec!(1500), date(3, 1), ledger.user)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::Overpayment { outstanding, .. }) if outstanding == dec!(1000)
    ));

    let err = ledger
        .core
        .transactions
        .record_payment(invoice.id, dec!(0.001), date(3, 1), ledger.user)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::InvalidPaymentAmount(_))
    ));

    let reloaded = ledger
        .core
        .transactions
        .get_transaction(invoice.id)
        .await
        .unwrap();
    assert_eq!(reloaded.status, TransactionStatus::Posted);
    assert_eq!(reloaded.outstanding(), Some(dec!(1000)));
}

#[tokio::test]
async fn test_payment_on_journal_entry_is_refused() {
    let ledger = TestLedger::new().await;
    let journal = ledger.post_revenue(3, dec!(100)).await;

    let err = ledger
        .core
        .transactions
        .record_payment(journal.id, dec!(100), date(3, 1), ledger.user)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::NotPayable(id)) if id == journal.id
    ));
}

#[tokio::test]
async fn test_voided_partially_paid_invoice_leaves_aging() {
    let ledger = TestLedger::new().await;
    let customer = CustomerId::new();
    let invoice = ledger
        .posted_invoice(customer, dec!(800), date(2, 1))
        .await;
    ledger
        .core
        .transactions
        .record_payment(invoice.id, dec!(300), date(2, 20), ledger.user)
        .await
        .unwrap();
    assert_eq!(
        ledger.balance(ledger.accounts.receivable.id, 1).await,
        dec!(800)
    );

    let voided = ledger
        .core
        .transactions
        .void(invoice.id, "issued in error", ledger.user)
        .await
        .unwrap();
    assert_eq!(voided.status, TransactionStatus::Voided);
    assert_eq!(voided.settlement.as_ref().map(|s| s.payments.len()), Some(1));
    assert_eq!(
        ledger.balance(ledger.accounts.receivable.id, 1).await,
        dec!(0)
    );

    let err = ledger
        .core
        .transactions
        .record_payment(invoice.id, dec!(100), date(3, 1), ledger.user)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InvalidState);

    let report = ledger
        .core
        .aging
        .compute_aging(None, date(3, 15))
        .await
        .unwrap();
    assert!(report.customers.is_empty());
}

#[tokio::test]
async fn test_aging_groups_by_customer() {
    let ledger = TestLedger::new().await;
    let as_of = date(3, 15);
    let first = CustomerId::new();
    let second = CustomerId::new();

    ledger.posted_invoice(first, dec!(100), as_of).await;
    ledger
        .posted_invoice(first, dec!(200), as_of - Duration::days(10))
        .await;
    ledger
        .posted_invoice(second, dec!(50), as_of - Duration::days(70))
        .await;

    let report = ledger.core.aging.compute_aging(None, as_of).await.unwrap();
    assert_eq!(report.customers.len(), 2);
    assert_eq!(report.total, dec!(350));
    assert_eq!(report.buckets.current, dec!(100));
    assert_eq!(report.buckets.days_1_30, dec!(200));
    assert_eq!(report.buckets.days_61_90, dec!(50));

    let only_first = ledger
        .core
        .aging
        .compute_aging(Some(first), as_of)
        .await
        .unwrap();
    assert_eq!(only_first.customers.len(), 1);
    assert_eq!(only_first.total, dec!(300));
    let due_dates: Vec<_> = only_first.customers[0]
        .invoices
        .iter()
        .map(|line| line.due_date)
        .collect();
    assert_eq!(due_dates, vec![as_of - Duration::days(10), as_of]);
}

#[tokio::test]
async fn test_unposted_invoices_are_aged_until_voided() {
    let ledger = TestLedger::new().await;
    let customer = CustomerId::new();
    let workflow = &ledger.core.transactions;
    let input = NewTransaction::invoice(
        ledger.period(3).id,
        date(3, 1),
        customer,
        date(3, 5),
        vec![
            EntryInput::debit(ledger.accounts.receivable.id, dec!(250)),
            EntryInput::credit(ledger.accounts.revenue.id, dec!(250)),
        ],
        ledger.user,
    );
    let draft = workflow.create_draft(input).await.unwrap();
    let approved = workflow.approve(draft.id, ledger.user).await.unwrap();
    assert_eq!(approved.status, TransactionStatus::Approved);

    let report = ledger
        .core
        .aging
        .compute_aging(Some(customer), date(3, 15))
        .await
        .unwrap();
    assert_eq!(report.total, dec!(250));
    assert_eq!(report.buckets.days_1_30, dec!(250));
    assert_eq!(report.customers[0].invoices[0].transaction_id, draft.id);
    assert_eq!(ledger.balance(ledger.accounts.receivable.id, 3).await, dec!(0));

    workflow
        .void(draft.id, "issued in error", ledger.user)
        .await
        .unwrap();
    let report = ledger
        .core
        .aging
        .compute_aging(Some(customer), date(3, 15))
        .await
        .unwrap();
    assert!(report.customers.is_empty());
    assert_eq!(report.total, dec!(0));
}
