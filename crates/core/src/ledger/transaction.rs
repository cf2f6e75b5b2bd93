//! Transaction aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use fundbook_shared::types::{
    CustomerId, FiscalPeriodId, FiscalYearId, PaymentId, TransactionId, UserId, VendorId,
};

use super::entry::{EntryInput, TransactionEntry};
use crate::workflow::TransactionStatus;

/// Kind of transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// General journal entry.
    JournalEntry,
    /// Payable owed to a vendor.
    Bill,
    /// Receivable owed by a customer.
    Invoice,
}

impl TransactionKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JournalEntry => "journal_entry",
            Self::Bill => "bill",
            Self::Invoice => "invoice",
        }
    }

    /// Returns true for kinds that carry settlement terms and accept payments.
    #[must_use]
    pub fn is_payable(&self) -> bool {
        matches!(self, Self::Bill | Self::Invoice)
    }
}

/// The other party of a bill or invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Counterparty {
    /// Customer billed by an invoice.
    Customer(CustomerId),
    /// Vendor that issued a bill.
    Vendor(VendorId),
}

/// A payment applied to a bill or invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier.
    pub id: PaymentId,
    /// Amount paid.
    pub amount: Decimal,
    /// Date the payment was made.
    pub paid_on: NaiveDate,
    /// User who recorded the payment.
    pub recorded_by: UserId,
    /// When the payment was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Settlement terms of a bill or invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Customer or vendor.
    pub counterparty: Counterparty,
    /// Payment due date.
    pub due_date: NaiveDate,
    /// Total amount due.
    pub amount_due: Decimal,
    /// Payments received so far, in recording order.
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Settlement {
    /// Sum of all recorded payments.
    #[must_use]
    pub fn amount_paid(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Amount still owed.
    #[must_use]
    pub fn outstanding(&self) -> Decimal {
        self.amount_due - self.amount_paid()
    }

    /// Returns the customer for invoices.
    #[must_use]
    pub fn customer_id(&self) -> Option<CustomerId> {
        match self.counterparty {
            Counterparty::Customer(id) => Some(id),
            Counterparty::Vendor(_) => None,
        }
    }
}

/// Who approved a transaction, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Approving user.
    pub approved_by: UserId,
    /// Approval time.
    pub approved_at: DateTime<Utc>,
}

/// Why, by whom, and when a transaction was voided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidRecord {
    /// Mandatory reason.
    pub reason: String,
    /// Voiding user.
    pub voided_by: UserId,
    /// Void time.
    pub voided_at: DateTime<Utc>,
}

/// A financial transaction consisting of debit and credit lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier.
    pub id: TransactionId,
    /// Journal entry, bill or invoice.
    pub kind: TransactionKind,
    /// Transaction date.
    pub transaction_date: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// Current lifecycle status.
    pub status: TransactionStatus,
    /// Fiscal year of `fiscal_period_id`.
    pub fiscal_year_id: FiscalYearId,
    /// Fiscal period the transaction posts to.
    pub fiscal_period_id: FiscalPeriodId,
    /// Debit and credit lines, in input order.
    #[serde(default)]
    pub entries: Vec<TransactionEntry>,
    /// Sum of debit amounts.
    pub amount: Decimal,
    /// Settlement terms (bills and invoices only).
    pub settlement: Option<Settlement>,
    /// Optimistic concurrency counter, bumped on every write.
    pub version: u64,
    /// User who created the transaction.
    pub created_by: UserId,
    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
    /// When the transaction was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the transaction was submitted for approval.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Approval record.
    pub approval: Option<ApprovalRecord>,
    /// User who posted the transaction.
    pub posted_by: Option<UserId>,
    /// When the transaction was posted.
    pub posted_at: Option<DateTime<Utc>>,
    /// Void record.
    pub void_record: Option<VoidRecord>,
    /// Reason given by the last rejection.
    pub rejection_reason: Option<String>,
}

impl Transaction {
    /// Sum of debit amounts across all lines.
    #[must_use]
    pub fn total_debits(&self) -> Decimal {
        self.entries.iter().map(|e| e.debit_amount).sum()
    }

    /// Sum of credit amounts across all lines.
    #[must_use]
    pub fn total_credits(&self) -> Decimal {
        self.entries.iter().map(|e| e.credit_amount).sum()
    }

    /// Returns true if the entries can still be edited.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.status.is_editable()
    }

    /// Amount still owed on a bill or invoice.
    #[must_use]
    pub fn outstanding(&self) -> Option<Decimal> {
        self.settlement.as_ref().map(Settlement::outstanding)
    }

    /// Replaces the lines of a draft and recomputes `amount`.
    pub(crate) fn replace_entries(&mut self, inputs: &[EntryInput]) {
        self.entries = inputs
            .iter()
            .map(|input| TransactionEntry::from_input(self.id, input))
            .collect();
        self.amount = self.total_debits();
    }
}

/// Settlement terms supplied when creating a bill or invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSettlement {
    /// Customer or vendor.
    pub counterparty: Counterparty,
    /// Payment due date.
    pub due_date: NaiveDate,
    /// Total amount due.
    pub amount_due: Decimal,
}

/// Input for creating a draft transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// Journal entry, bill or invoice.
    pub kind: TransactionKind,
    /// Transaction date.
    pub transaction_date: NaiveDate,
    /// Free-text description.
    pub description: String,
    /// Fiscal period to post to.
    pub fiscal_period_id: FiscalPeriodId,
    /// Lines; drafts may be unbalanced.
    pub entries: Vec<EntryInput>,
    /// Settlement terms, required for bills and invoices.
    pub settlement: Option<NewSettlement>,
    /// Creating user.
    pub created_by: UserId,
}

impl NewTransaction {
    /// A journal entry.
    #[must_use]
    pub fn journal_entry(
        fiscal_period_id: FiscalPeriodId,
        transaction_date: NaiveDate,
        description: impl Into<String>,
        entries: Vec<EntryInput>,
        created_by: UserId,
    ) -> Self {
        Self {
            kind: TransactionKind::JournalEntry,
            transaction_date,
            description: description.into(),
            fiscal_period_id,
            entries,
            settlement: None,
            created_by,
        }
    }

    /// An invoice billed to `customer`.
    #[must_use]
    pub fn invoice(
        fiscal_period_id: FiscalPeriodId,
        transaction_date: NaiveDate,
        customer: CustomerId,
        due_date: NaiveDate,
        entries: Vec<EntryInput>,
        created_by: UserId,
    ) -> Self {
        let amount_due = entries.iter().map(|e| e.debit_amount).sum();
        Self {
            kind: TransactionKind::Invoice,
            transaction_date,
            description: String::new(),
            fiscal_period_id,
            entries,
            settlement: Some(NewSettlement {
                counterparty: Counterparty::Customer(customer),
                due_date,
                amount_due,
            }),
            created_by,
        }
    }

    /// A bill received from `vendor`.
    #[must_use]
    pub fn bill(
        fiscal_period_id: FiscalPeriodId,
        transaction_date: NaiveDate,
        vendor: VendorId,
        due_date: NaiveDate,
        entries: Vec<EntryInput>,
        created_by: UserId,
    ) -> Self {
        let amount_due = entries.iter().map(|e| e.debit_amount).sum();
        Self {
            kind: TransactionKind::Bill,
            transaction_date,
            description: String::new(),
            fiscal_period_id,
            entries,
            settlement: Some(NewSettlement {
                counterparty: Counterparty::Vendor(vendor),
                due_date,
                amount_due,
            }),
            created_by,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fundbook_shared::types::AccountId;
    use rust_decimal_macros::dec;

    fn payment(amount: Decimal) -> Payment {
        Payment {
            id: PaymentId::new(),
            amount,
            paid_on: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            recorded_by: UserId::new(),
            recorded_at: Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_settlement_outstanding() {
        let customer = CustomerId::new();
        let mut settlement = Settlement {
            counterparty: Counterparty::Customer(customer),
            due_date: NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
            amount_due: dec!(1000),
            payments: vec![],
        };
        assert_eq!(settlement.outstanding(), dec!(1000));

        settlement.payments.push(payment(dec!(250)));
        settlement.payments.push(payment(dec!(100.50)));
        assert_eq!(settlement.amount_paid(), dec!(350.50));
        assert_eq!(settlement.outstanding(), dec!(649.50));
        assert_eq!(settlement.customer_id(), Some(customer));
    }

    #[test]
    fn test_invoice_constructor_uses_debit_total_as_amount_due() {
        let receivable = AccountId::new();
        let revenue = AccountId::new();
        let input = NewTransaction::invoice(
            FiscalPeriodId::new(),
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            CustomerId::new(),
            NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
            vec![
                EntryInput::debit(receivable, dec!(1000)),
                EntryInput::credit(revenue, dec!(1000)),
            ],
            UserId::new(),
        );

        assert_eq!(input.kind, TransactionKind::Invoice);
        assert_eq!(input.settlement.map(|s| s.amount_due), Some(dec!(1000)));
    }

    #[test]
    fn test_kind_payable() {
        assert!(TransactionKind::Bill.is_payable());
        assert!(TransactionKind::Invoice.is_payable());
        assert!(!TransactionKind::JournalEntry.is_payable());
    }
}
