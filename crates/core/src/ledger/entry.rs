//! Transaction entry lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use fundbook_shared::types::{AccountId, EntryId, FundId, TransactionId};

/// Which side of the ledger a line posts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySide {
    /// Debit line.
    Debit,
    /// Credit line.
    Credit,
}

/// A single debit or credit line of a transaction.
///
/// Exactly one of `debit_amount` / `credit_amount` is non-zero on a valid line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    /// Unique identifier for this line.
    pub id: EntryId,
    /// The transaction this line belongs to.
    pub transaction_id: TransactionId,
    /// The account affected by this line.
    pub account_id: AccountId,
    /// Fund the amount is attributed to.
    pub fund_id: Option<FundId>,
    /// Debit amount (zero on credit lines).
    pub debit_amount: Decimal,
    /// Credit amount (zero on debit lines).
    pub credit_amount: Decimal,
    /// Optional line memo.
    pub memo: Option<String>,
}

impl TransactionEntry {
    /// Builds a stored line from caller input.
    #[must_use]
    pub fn from_input(transaction_id: TransactionId, input: &EntryInput) -> Self {
        Self {
            id: EntryId::new(),
            transaction_id,
            account_id: input.account_id,
            fund_id: input.fund_id,
            debit_amount: input.debit_amount,
            credit_amount: input.credit_amount,
            memo: input.memo.clone(),
        }
    }

    /// Returns debit minus credit.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.debit_amount - self.credit_amount
    }

    /// Returns the side this line posts to, or `None` for a malformed line.
    #[must_use]
    pub fn side(&self) -> Option<EntrySide> {
        match (self.debit_amount.is_zero(), self.credit_amount.is_zero()) {
            (false, true) => Some(EntrySide::Debit),
            (true, false) => Some(EntrySide::Credit),
            _ => None,
        }
    }
}

/// Caller-supplied line for a new or edited draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInput {
    /// The account to post to.
    pub account_id: AccountId,
    /// Fund attribution.
    pub fund_id: Option<FundId>,
    /// Debit amount.
    pub debit_amount: Decimal,
    /// Credit amount.
    pub credit_amount: Decimal,
    /// Optional memo.
    pub memo: Option<String>,
}

impl EntryInput {
    /// A debit line.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            fund_id: None,
            debit_amount: amount,
            credit_amount: Decimal::ZERO,
            memo: None,
        }
    }

    /// A credit line.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            fund_id: None,
            debit_amount: Decimal::ZERO,
            credit_amount: amount,
            memo: None,
        }
    }

    /// Attributes the line to `fund_id`.
    #[must_use]
    pub fn with_fund(mut self, fund_id: FundId) -> Self {
        self.fund_id = Some(fund_id);
        self
    }

    /// Attaches a memo.
    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}
