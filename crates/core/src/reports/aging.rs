//! Accounts-receivable aging.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;
use fundbook_shared::types::CustomerId;

use super::types::{AgingBucket, AgingBuckets, AgingLine, AgingReport, CustomerAging};
use crate::error::LedgerError;
use crate::ledger::{Transaction, TransactionKind};
use crate::repository::LedgerRepository;
use crate::workflow::TransactionStatus;

/// Builds an aging report from invoices.
///
/// Every non-voided invoice with a positive outstanding amount is aged,
/// whatever its approval stage. Anything that is not an invoice is skipped.
#[must_use]
pub fn build_aging_report(invoices: &[Transaction], as_of: NaiveDate) -> AgingReport {
    let mut by_customer: BTreeMap<CustomerId, Vec<AgingLine>> = BTreeMap::new();

    for invoice in invoices {
        if invoice.kind != TransactionKind::Invoice || invoice.status == TransactionStatus::Voided {
            continue;
        }
        let Some(settlement) = &invoice.settlement else {
            continue;
        };
        let Some(customer_id) = settlement.customer_id() else {
            continue;
        };
        let outstanding = settlement.outstanding();
        if outstanding <= Decimal::ZERO {
            continue;
        }

        let days_overdue = (as_of - settlement.due_date).num_days();
        by_customer.entry(customer_id).or_default().push(AgingLine {
            transaction_id: invoice.id,
            transaction_date: invoice.transaction_date,
            due_date: settlement.due_date,
            amount_due: settlement.amount_due,
            amount_paid: settlement.amount_paid(),
            outstanding,
            days_overdue,
            bucket: AgingBucket::for_days_overdue(days_overdue),
        });
    }

    let mut buckets = AgingBuckets::default();
    let customers: Vec<CustomerAging> = by_customer
        .into_iter()
        .map(|(customer_id, mut invoices)| {
            invoices.sort_by_key(|line| (line.due_date, line.transaction_id));
            let mut customer_buckets = AgingBuckets::default();
            for line in &invoices {
                customer_buckets.add(line.bucket, line.outstanding);
            }
            buckets.merge(&customer_buckets);
            CustomerAging {
                customer_id,
                invoices,
                total: customer_buckets.total(),
                buckets: customer_buckets,
            }
        })
        .collect();

    AgingReport {
        as_of,
        customers,
        total: buckets.total(),
        buckets,
    }
}

/// Computes receivables aging from the repository.
pub struct AgingEngine<R: LedgerRepository> {
    repo: Arc<R>,
}

impl<R: LedgerRepository> AgingEngine<R> {
    /// Create a new aging engine.
    #[must_use]
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Ages outstanding invoices as of `as_of`, for one customer or all.
    pub async fn compute_aging(
        &self,
        customer_id: Option<CustomerId>,
        as_of: NaiveDate,
    ) -> Result<AgingReport, LedgerError> {
        let invoices = match customer_id {
            Some(id) => self.repo.list_invoices_by_customer(id).await?,
            None => self.repo.list_invoices().await?,
        };
        let report = build_aging_report(&invoices, as_of);

        debug!(
            %as_of,
            customers = report.customers.len(),
            total = %report.total,
            "Aging computed"
        );
        Ok(report)
    }
}
