//! Persistence interface consumed by every service.
//!
//! The core never talks to storage directly. A backend implements
//! [`LedgerRepository`]; `fundbook-store` ships an in-memory one.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use fundbook_shared::types::{
    AccountId, BudgetId, CustomerId, FiscalPeriodId, FiscalYearId, TransactionId,
};

use crate::balance::{BalanceBucket, BalanceKey, PostingRecord};
use crate::budget::{Budget, BudgetRevision};
use crate::chart::Account;
use crate::error::LedgerError;
use crate::fiscal::{FiscalPeriod, FiscalYear};
use crate::ledger::{Transaction, TransactionEntry};

/// Errors reported by a persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The stored version differs from the caller's expectation.
    #[error("{entity} {id} version mismatch: expected {expected}, found {actual}")]
    VersionConflict {
        /// Entity kind.
        entity: &'static str,
        /// Entity ID.
        id: String,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// Insert of a record that already exists.
    #[error("{entity} {id} already exists")]
    Duplicate {
        /// Entity kind.
        entity: &'static str,
        /// Entity ID.
        id: String,
    },

    /// Update of a record that does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Entity ID.
        id: String,
    },

    /// Backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true if the write lost an optimistic race.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. } | Self::Duplicate { .. })
    }
}

/// A record together with the version the writer last read.
///
/// `expected_version` is 0 for a record that must not exist yet. Writers bump
/// the record's own `version` before handing it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The record to store.
    pub record: T,
    /// Version that must currently be stored.
    pub expected_version: u64,
}

impl<T> Versioned<T> {
    /// Wraps `record` with its expected stored version.
    pub fn new(record: T, expected_version: u64) -> Self {
        Self {
            record,
            expected_version,
        }
    }
}

/// A change to the posting journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostingWrite {
    /// Insert a new record; fails if one exists for the transaction.
    Applied(PostingRecord),
    /// Mark an existing, unreversed record as reversed.
    Reversed {
        /// Posted transaction.
        transaction_id: TransactionId,
        /// Reversal time.
        reversed_at: DateTime<Utc>,
    },
}

/// A set of writes committed atomically.
///
/// Every version expectation is checked before anything is applied; if any
/// check fails nothing is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    /// Transaction writes.
    pub transactions: Vec<Versioned<Transaction>>,
    /// Balance bucket writes.
    pub balances: Vec<Versioned<BalanceBucket>>,
    /// Posting journal writes.
    pub postings: Vec<PostingWrite>,
    /// Budget write (items are part of the budget).
    pub budget: Option<Versioned<Budget>>,
    /// Revision records to append.
    pub budget_revisions: Vec<BudgetRevision>,
}

impl WriteBatch {
    /// An empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch holding one transaction write.
    #[must_use]
    pub fn transaction(record: Transaction, expected_version: u64) -> Self {
        Self {
            transactions: vec![Versioned::new(record, expected_version)],
            ..Self::default()
        }
    }

    /// Returns true if the batch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
            && self.balances.is_empty()
            && self.postings.is_empty()
            && self.budget.is_none()
            && self.budget_revisions.is_empty()
    }
}

/// A line of a balance-affecting transaction, as read from the posted log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedEntry {
    /// Owning transaction.
    pub transaction_id: TransactionId,
    /// Fiscal year of the transaction.
    pub fiscal_year_id: FiscalYearId,
    /// Fiscal period of the transaction.
    pub fiscal_period_id: FiscalPeriodId,
    /// Transaction date.
    pub transaction_date: NaiveDate,
    /// The line itself.
    pub entry: TransactionEntry,
}

/// Repository trait for ledger persistence.
///
/// Implementations must be safe to share across tasks. Loads return `None`
/// for missing records; writes taking an expected version are
/// compare-and-swap.
pub trait LedgerRepository: Send + Sync {
    /// Find an account by ID.
    fn load_account(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<Option<Account>, StoreError>> + Send;

    /// List every account, ordered by account number.
    fn list_accounts(&self) -> impl Future<Output = Result<Vec<Account>, StoreError>> + Send;

    /// List active accounts, ordered by account number.
    fn list_active_accounts(&self)
    -> impl Future<Output = Result<Vec<Account>, StoreError>> + Send;

    /// Insert or replace an account.
    fn save_account(&self, account: Account)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Physically remove an account.
    fn delete_account(&self, id: AccountId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns true if any transaction line references the account.
    fn account_has_entries(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Find a fiscal year by ID.
    fn load_fiscal_year(
        &self,
        id: FiscalYearId,
    ) -> impl Future<Output = Result<Option<FiscalYear>, StoreError>> + Send;

    /// Insert or replace a fiscal year.
    fn save_fiscal_year(
        &self,
        year: FiscalYear,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Find a fiscal period by ID.
    fn load_fiscal_period(
        &self,
        id: FiscalPeriodId,
    ) -> impl Future<Output = Result<Option<FiscalPeriod>, StoreError>> + Send;

    /// List the periods of a year, ordered by period number.
    fn list_fiscal_periods(
        &self,
        fiscal_year_id: FiscalYearId,
    ) -> impl Future<Output = Result<Vec<FiscalPeriod>, StoreError>> + Send;

    /// Insert or replace a fiscal period.
    fn save_fiscal_period(
        &self,
        period: FiscalPeriod,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Find a transaction by ID.
    fn load_transaction(
        &self,
        id: TransactionId,
    ) -> impl Future<Output = Result<Option<Transaction>, StoreError>> + Send;

    /// Compare-and-swap a transaction.
    fn save_transaction(
        &self,
        transaction: Transaction,
        expected_version: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Find a balance bucket.
    fn load_balance(
        &self,
        key: BalanceKey,
    ) -> impl Future<Output = Result<Option<BalanceBucket>, StoreError>> + Send;

    /// List buckets, optionally restricted to one account, ordered by key.
    fn list_balances(
        &self,
        account_id: Option<AccountId>,
    ) -> impl Future<Output = Result<Vec<BalanceBucket>, StoreError>> + Send;

    /// Compare-and-swap a balance bucket.
    fn save_balance(
        &self,
        bucket: BalanceBucket,
        expected_version: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Find the posting record of a transaction.
    fn load_posting(
        &self,
        transaction_id: TransactionId,
    ) -> impl Future<Output = Result<Option<PostingRecord>, StoreError>> + Send;

    /// Find a budget by ID.
    fn load_budget(
        &self,
        id: BudgetId,
    ) -> impl Future<Output = Result<Option<Budget>, StoreError>> + Send;

    /// Compare-and-swap a budget.
    fn save_budget(
        &self,
        budget: Budget,
        expected_version: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Append a revision record.
    fn append_budget_revision(
        &self,
        revision: BudgetRevision,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// List a budget's revisions in revision-number order.
    fn list_budget_revisions(
        &self,
        budget_id: BudgetId,
    ) -> impl Future<Output = Result<Vec<BudgetRevision>, StoreError>> + Send;

    /// List every invoice regardless of status.
    fn list_invoices(&self) -> impl Future<Output = Result<Vec<Transaction>, StoreError>> + Send;

    /// List the invoices of one customer regardless of status.
    fn list_invoices_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> impl Future<Output = Result<Vec<Transaction>, StoreError>> + Send;

    /// List the lines posting to `account_id` from balance-affecting
    /// transactions, oldest first.
    fn list_posted_entries_for_account(
        &self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Vec<PostedEntry>, StoreError>> + Send;

    /// Apply a batch atomically.
    fn commit(&self, batch: WriteBatch) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Loads every account in `ids` that exists.
pub(crate) async fn load_accounts<R, I>(
    repo: &R,
    ids: I,
) -> Result<HashMap<AccountId, Account>, LedgerError>
where
    R: LedgerRepository,
    I: IntoIterator<Item = AccountId>,
{
    let mut accounts = HashMap::new();
    for id in ids {
        if accounts.contains_key(&id) {
            continue;
        }
        if let Some(account) = repo.load_account(id).await? {
            accounts.insert(id, account);
        }
    }
    Ok(accounts)
}
