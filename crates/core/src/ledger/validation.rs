//! Business rule validation for ledger operations.
//!
//! Everything in this module is pure: callers load the accounts and the
//! fiscal period first and pass them in.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use fundbook_shared::types::{is_minor_unit, AccountId, FiscalPeriodId, TransactionId};

use super::entry::TransactionEntry;
use super::transaction::TransactionKind;
use crate::chart::Account;
use crate::fiscal::FiscalPeriod;

/// Validation errors for ledger, chart and settlement operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Transaction has no entries.
    #[error("transaction must have at least one entry")]
    NoEntries,

    /// A line carries a negative amount.
    #[error("line {line}: amounts cannot be negative")]
    NegativeAmount {
        /// Zero-based line index.
        line: usize,
    },

    /// A line carries both a debit and a credit.
    #[error("line {line}: specify either a debit or a credit, not both")]
    BothSides {
        /// Zero-based line index.
        line: usize,
    },

    /// A line carries neither a debit nor a credit.
    #[error("line {line}: amount cannot be zero")]
    ZeroLine {
        /// Zero-based line index.
        line: usize,
    },

    /// A line amount is finer than the minor unit.
    #[error("line {line}: amount {amount} has more than two decimal places")]
    SubMinorUnit {
        /// Zero-based line index.
        line: usize,
        /// Offending amount.
        amount: Decimal,
    },

    /// Transaction entries do not balance.
    #[error("transaction is unbalanced: debits ({debit}) != credits ({credit})")]
    Unbalanced {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// A line references an account that does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// A line references an inactive account.
    #[error("account {0} is inactive")]
    AccountInactive(AccountId),

    /// Fiscal period does not exist.
    #[error("fiscal period not found: {0}")]
    FiscalPeriodNotFound(FiscalPeriodId),

    /// Fiscal period is closed.
    #[error("fiscal period {0} is closed, no posting allowed")]
    PeriodClosed(FiscalPeriodId),

    /// Transaction date lies outside its fiscal period.
    #[error("date {date} is outside fiscal period {period}")]
    DateOutsidePeriod {
        /// Transaction date.
        date: NaiveDate,
        /// Fiscal period.
        period: FiscalPeriodId,
    },

    /// Fiscal year start date cannot produce a full calendar.
    #[error("fiscal year starting {0} is out of range")]
    InvalidFiscalYear(NaiveDate),

    /// Earlier periods of the year are still open.
    #[error("cannot close fiscal period {0}: earlier periods must be closed first")]
    EarlierPeriodsOpen(FiscalPeriodId),

    /// Void reason is required but not provided.
    #[error("void reason is required")]
    VoidReasonRequired,

    /// Rejection reason is required but not provided.
    #[error("rejection reason is required")]
    RejectionReasonRequired,

    /// Bills and invoices need settlement terms.
    #[error("{0} requires settlement terms")]
    SettlementRequired(&'static str),

    /// Journal entries cannot carry settlement terms.
    #[error("journal entries cannot carry settlement terms")]
    SettlementNotAllowed,

    /// Invoice billed to a vendor, or bill from a customer.
    #[error("counterparty does not match a {0}")]
    CounterpartyMismatch(&'static str),

    /// Amount due must be positive and at minor-unit scale.
    #[error("invalid amount due: {0}")]
    InvalidAmountDue(Decimal),

    /// Payment amount must be positive and at minor-unit scale.
    #[error("invalid payment amount: {0}")]
    InvalidPaymentAmount(Decimal),

    /// Payment would exceed the amount still owed.
    #[error("payment of {payment} exceeds outstanding {outstanding} on {transaction}")]
    Overpayment {
        /// Bill or invoice.
        transaction: TransactionId,
        /// Amount still owed.
        outstanding: Decimal,
        /// Attempted payment.
        payment: Decimal,
    },

    /// Only bills and invoices accept payments.
    #[error("transaction {0} does not accept payments")]
    NotPayable(TransactionId),

    /// Account number is blank.
    #[error("account number cannot be empty")]
    EmptyAccountNumber,

    /// Account number already in use.
    #[error("account number {0} is already in use")]
    DuplicateAccountNumber(String),

    /// Parent account does not exist.
    #[error("parent account not found: {0}")]
    ParentNotFound(AccountId),

    /// Re-parenting would create a cycle.
    #[error("account {account} cannot be placed under its descendant {parent}")]
    AccountCycle {
        /// Account being moved.
        account: AccountId,
        /// Requested parent.
        parent: AccountId,
    },

    /// Account is referenced by entries and cannot be deleted.
    #[error("account {0} is referenced by transaction entries")]
    AccountReferenced(AccountId),

    /// Account has children and cannot be deleted.
    #[error("account {0} has child accounts")]
    AccountHasChildren(AccountId),
}

impl ValidationError {
    /// Returns the error code for outer layers.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoEntries => "NO_ENTRIES",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::BothSides { .. } => "INVALID_ENTRY_TYPE",
            Self::ZeroLine { .. } => "ZERO_AMOUNT",
            Self::SubMinorUnit { .. } => "SUB_MINOR_UNIT_AMOUNT",
            Self::Unbalanced { .. } => "UNBALANCED_TRANSACTION",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::FiscalPeriodNotFound(_) => "NO_FISCAL_PERIOD",
            Self::PeriodClosed(_) => "PERIOD_CLOSED",
            Self::DateOutsidePeriod { .. } => "DATE_OUTSIDE_PERIOD",
            Self::InvalidFiscalYear(_) => "INVALID_FISCAL_YEAR",
            Self::EarlierPeriodsOpen(_) => "EARLIER_PERIODS_NOT_CLOSED",
            Self::VoidReasonRequired => "VOID_REASON_REQUIRED",
            Self::RejectionReasonRequired => "REJECTION_REASON_REQUIRED",
            Self::SettlementRequired(_) => "SETTLEMENT_REQUIRED",
            Self::SettlementNotAllowed => "SETTLEMENT_NOT_ALLOWED",
            Self::CounterpartyMismatch(_) => "COUNTERPARTY_MISMATCH",
            Self::InvalidAmountDue(_) => "INVALID_AMOUNT_DUE",
            Self::InvalidPaymentAmount(_) => "INVALID_PAYMENT_AMOUNT",
            Self::Overpayment { .. } => "OVERPAYMENT",
            Self::NotPayable(_) => "NOT_PAYABLE",
            Self::EmptyAccountNumber => "EMPTY_ACCOUNT_NUMBER",
            Self::DuplicateAccountNumber(_) => "DUPLICATE_ACCOUNT_NUMBER",
            Self::ParentNotFound(_) => "PARENT_NOT_FOUND",
            Self::AccountCycle { .. } => "ACCOUNT_CYCLE",
            Self::AccountReferenced(_) => "ACCOUNT_REFERENCED",
            Self::AccountHasChildren(_) => "ACCOUNT_HAS_CHILDREN",
        }
    }
}

/// Totals of a validated entry list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of debits.
    pub debit: Decimal,
    /// Sum of credits.
    pub credit: Decimal,
    /// Number of lines.
    pub line_count: usize,
}

/// Checks each line's structure without looking at accounts or balance.
///
/// Used while a transaction is still a draft: drafts may be unbalanced or
/// empty, but no line may be malformed.
///
/// # Errors
///
/// Returns the first malformed line.
pub fn validate_line_shape(entries: &[TransactionEntry]) -> Result<(), ValidationError> {
    for (line, entry) in entries.iter().enumerate() {
        let (debit, credit) = (entry.debit_amount, entry.credit_amount);

        if debit < Decimal::ZERO || credit < Decimal::ZERO {
            return Err(ValidationError::NegativeAmount { line });
        }
        if !debit.is_zero() && !credit.is_zero() {
            return Err(ValidationError::BothSides { line });
        }
        if debit.is_zero() && credit.is_zero() {
            return Err(ValidationError::ZeroLine { line });
        }
        let amount = debit.max(credit);
        if !is_minor_unit(amount) {
            return Err(ValidationError::SubMinorUnit { line, amount });
        }
    }
    Ok(())
}

/// Validates a full entry list before it may leave draft.
///
/// Checks, in order: non-empty, every line well-formed, every account known
/// and active, debits equal credits.
///
/// # Errors
///
/// Returns the first rule violated.
pub fn validate_entries<'a, F>(
    entries: &[TransactionEntry],
    lookup: F,
) -> Result<EntryTotals, ValidationError>
where
    F: Fn(AccountId) -> Option<&'a Account>,
{
    if entries.is_empty() {
        return Err(ValidationError::NoEntries);
    }

    validate_line_shape(entries)?;

    for entry in entries {
        let account = lookup(entry.account_id)
            .ok_or(ValidationError::AccountNotFound(entry.account_id))?;
        if !account.is_active {
            return Err(ValidationError::AccountInactive(entry.account_id));
        }
    }

    let debit: Decimal = entries.iter().map(|e| e.debit_amount).sum();
    let credit: Decimal = entries.iter().map(|e| e.credit_amount).sum();

    if debit != credit {
        return Err(ValidationError::Unbalanced { debit, credit });
    }

    Ok(EntryTotals {
        debit,
        credit,
        line_count: entries.len(),
    })
}

/// Checks that `date` may be posted to `period`.
///
/// # Errors
///
/// Returns an error if the period is closed or does not contain the date.
pub fn validate_posting_period(period: &FiscalPeriod, date: NaiveDate) -> Result<(), ValidationError> {
    if !period.is_open() {
        return Err(ValidationError::PeriodClosed(period.id));
    }
    if !period.contains_date(date) {
        return Err(ValidationError::DateOutsidePeriod {
            date,
            period: period.id,
        });
    }
    Ok(())
}

/// Checks that a positive amount is expressed in whole minor units.
pub(crate) fn is_positive_minor_unit(amount: Decimal) -> bool {
    amount > Decimal::ZERO && is_minor_unit(amount)
}

/// Human name of a kind for error messages.
pub(crate) fn kind_label(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::JournalEntry => "journal entry",
        TransactionKind::Bill => "bill",
        TransactionKind::Invoice => "invoice",
    }
}
